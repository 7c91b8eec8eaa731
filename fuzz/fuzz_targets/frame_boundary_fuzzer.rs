//! Fuzz target for frame header boundary conditions
//!
//! Builds headers field by field so the fuzzer can reach every rejection
//! path:
//! - payload sizes at and around `MAX_PAYLOAD_SIZE`
//! - wrong magic and version bytes
//! - payloads shorter or longer than the header claims
//!
//! Decoding must reject exactly the inputs the header rules reject.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relayhub_proto::{Frame, FrameHeader, ProtocolError};

#[derive(Debug, Arbitrary)]
struct BoundaryInput {
    magic: MagicChoice,
    version: u8,
    flags: u8,
    opcode: u16,
    size: SizeChoice,
    session_id: u64,
    payload: Vec<u8>,
}

#[derive(Debug, Arbitrary)]
enum MagicChoice {
    Valid,
    Random(u32),
}

#[derive(Debug, Arbitrary)]
enum SizeChoice {
    Exact,
    AtMax,
    OverMax(u16),
    Short(u8),
    Long(u8),
    Random(u32),
}

fuzz_target!(|input: BoundaryInput| {
    let magic = match input.magic {
        MagicChoice::Valid => FrameHeader::MAGIC,
        MagicChoice::Random(m) => m,
    };

    let actual = input.payload.len() as u32;
    let claimed = match input.size {
        SizeChoice::Exact => actual,
        SizeChoice::AtMax => FrameHeader::MAX_PAYLOAD_SIZE,
        SizeChoice::OverMax(extra) => FrameHeader::MAX_PAYLOAD_SIZE + 1 + u32::from(extra),
        SizeChoice::Short(n) => actual.saturating_sub(u32::from(n)),
        SizeChoice::Long(n) => actual + 1 + u32::from(n),
        SizeChoice::Random(s) => s,
    };

    let mut wire = Vec::with_capacity(FrameHeader::SIZE + input.payload.len());
    wire.extend_from_slice(&magic.to_be_bytes());
    wire.push(input.version);
    wire.push(input.flags);
    wire.extend_from_slice(&input.opcode.to_be_bytes());
    wire.extend_from_slice(&claimed.to_be_bytes());
    wire.extend_from_slice(&input.session_id.to_be_bytes());
    wire.extend_from_slice(&[0u8; 4]);
    wire.extend_from_slice(&input.payload);

    let result = Frame::decode(&wire);

    if magic != FrameHeader::MAGIC {
        assert!(matches!(result, Err(ProtocolError::InvalidMagic)), "bad magic accepted");
        return;
    }

    if input.version != FrameHeader::VERSION {
        assert!(
            matches!(result, Err(ProtocolError::UnsupportedVersion(v)) if v == input.version),
            "bad version accepted"
        );
        return;
    }

    if claimed > FrameHeader::MAX_PAYLOAD_SIZE {
        assert!(
            matches!(result, Err(ProtocolError::PayloadTooLarge { .. })),
            "oversized claim of {claimed} bytes accepted"
        );
        return;
    }

    if claimed > actual {
        assert!(
            matches!(result, Err(ProtocolError::FrameTruncated { .. })),
            "truncated payload accepted"
        );
        return;
    }

    let Ok(frame) = result else {
        panic!("well-formed frame rejected: {result:?}");
    };

    assert_eq!(frame.header.payload_size(), claimed);
    assert_eq!(frame.header.session_id(), input.session_id);
    assert_eq!(frame.header.opcode(), input.opcode);
    assert_eq!(frame.payload.len(), claimed as usize);
    assert_eq!(&frame.payload[..], &input.payload[..claimed as usize]);
});
