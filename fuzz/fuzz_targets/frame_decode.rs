//! Fuzz target for Frame::decode
//!
//! Arbitrary byte sequences through the frame decoder, looking for:
//! - Parser crashes or panics
//! - Integer overflows in size calculations
//! - Buffer over-reads
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relayhub_proto::Frame;

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        // Whatever decodes must re-encode to the same length
        let mut buf = Vec::new();
        if frame.encode(&mut buf).is_ok() {
            assert_eq!(buf.len(), frame.encoded_len());
        }
    }
});
