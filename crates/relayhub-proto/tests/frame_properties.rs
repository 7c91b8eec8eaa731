//! Property-based tests for frame encoding/decoding.
//!
//! These check the framing layer for all inputs rather than specific
//! examples: decoding never panics, the payload is recovered exactly, and
//! truncated input is always rejected.

use bytes::Bytes;
use proptest::prelude::*;
use relayhub_proto::{
    Frame, FrameHeader, Opcode, Payload, ProtocolError,
    payloads::relay::{ActivityBatch, ActivityRecord},
};

fn arbitrary_opcode() -> impl Strategy<Value = Opcode> {
    prop_oneof![
        Just(Opcode::ClaimRole),
        Just(Opcode::RoleAssigned),
        Just(Opcode::SystemAlert),
        Just(Opcode::StatusUpdate),
        Just(Opcode::SetVisibility),
        Just(Opcode::ScreenFrame),
        Just(Opcode::Sample),
        Just(Opcode::ActivityBatch),
        Just(Opcode::ActivityLog),
        Just(Opcode::Command),
        Just(Opcode::NodePresence),
        Just(Opcode::Error),
    ]
}

fn arbitrary_frame() -> impl Strategy<Value = Frame> {
    (arbitrary_opcode(), any::<u64>(), prop::collection::vec(any::<u8>(), 0..1024)).prop_map(
        |(opcode, session_id, payload)| {
            let mut header = FrameHeader::new(opcode);
            header.set_session_id(session_id);
            Frame::new(header, Bytes::from(payload))
        },
    )
}

proptest! {
    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Frame::decode(&bytes);
    }

    #[test]
    fn prop_encoded_frame_decodes_to_same_payload(frame in arbitrary_frame()) {
        let mut wire = Vec::new();
        frame.encode(&mut wire).expect("should encode");
        prop_assert_eq!(wire.len(), frame.encoded_len());

        let parsed = Frame::decode(&wire).expect("should decode");
        prop_assert_eq!(parsed.header.session_id(), frame.header.session_id());
        prop_assert_eq!(parsed.payload, frame.payload);
    }

    #[test]
    fn prop_truncated_frames_are_rejected(
        frame in arbitrary_frame().prop_filter("needs payload", |f| !f.payload.is_empty()),
        cut in 1usize..1024,
    ) {
        let mut wire = Vec::new();
        frame.encode(&mut wire).expect("should encode");

        let cut = cut.min(frame.payload.len());
        let truncated = &wire[..wire.len() - cut];
        let is_truncated = matches!(
            Frame::decode(truncated),
            Err(ProtocolError::FrameTruncated { .. })
        );
        prop_assert!(is_truncated);
    }

    #[test]
    fn prop_payload_decode_never_panics(
        opcode in arbitrary_opcode(),
        bytes in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let _ = Payload::decode(opcode, &bytes);
    }

    #[test]
    fn prop_activity_batch_keeps_record_order(
        messages in prop::collection::vec("[a-z ]{0,24}", 0..16),
    ) {
        let batch = ActivityBatch {
            subject: "sarah_phone1".to_string(),
            kind: "notification".to_string(),
            records: messages.iter().map(|m| ActivityRecord { message: m.clone() }).collect(),
        };

        let frame = Payload::ActivityBatch(batch.clone()).into_frame().expect("should encode");
        let Payload::ActivityBatch(decoded) = Payload::from_frame(&frame).expect("should decode")
        else {
            return Err(TestCaseError::fail("wrong payload variant"));
        };

        let decoded_messages: Vec<_> = decoded.records.into_iter().map(|r| r.message).collect();
        prop_assert_eq!(decoded_messages, messages);
    }
}
