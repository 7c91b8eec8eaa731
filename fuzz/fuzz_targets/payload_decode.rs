//! Fuzz target for Payload::decode and the relay subject peek
//!
//! CBOR decoding under every opcode with:
//! - Malformed CBOR data
//! - Type confusion (wrong payload type for opcode)
//! - Oversized strings or collections
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use relayhub_proto::{Frame, FrameHeader, Opcode, Payload};

const OPCODES: [Opcode; 12] = [
    Opcode::ClaimRole,
    Opcode::RoleAssigned,
    Opcode::SystemAlert,
    Opcode::StatusUpdate,
    Opcode::SetVisibility,
    Opcode::ScreenFrame,
    Opcode::Sample,
    Opcode::ActivityBatch,
    Opcode::ActivityLog,
    Opcode::Command,
    Opcode::NodePresence,
    Opcode::Error,
];

fuzz_target!(|data: &[u8]| {
    for opcode in OPCODES {
        let _ = Payload::decode(opcode, data);

        let frame = Frame::new(FrameHeader::new(opcode), Bytes::copy_from_slice(data));
        let _ = Payload::from_frame(&frame);
        if opcode.is_relay() {
            let _ = Payload::relay_subject(&frame);
        }
    }
});
