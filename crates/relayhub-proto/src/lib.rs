//! Relayhub wire protocol.
//!
//! Every message on the wire is a [`Frame`]: a fixed 24-byte binary header
//! followed by a CBOR payload. The header carries everything the server
//! needs to route (opcode, payload size, origin session), so relay frames can
//! be forwarded without re-encoding their payload.
//!
//! # Components
//!
//! - [`FrameHeader`]: zero-copy fixed header (Big Endian)
//! - [`Frame`]: header + raw payload bytes
//! - [`Payload`]: typed CBOR payloads, one variant per [`Opcode`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
mod flags;
mod frame;
mod header;
mod opcode;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use flags::FrameFlags;
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcode::Opcode;
pub use payloads::Payload;

/// ALPN identifier negotiated by relayhub clients and servers.
pub const ALPN_PROTOCOL: &[u8] = b"relayhub";
