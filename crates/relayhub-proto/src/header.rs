//! Frame header with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 24-byte structure serialized as raw binary
//! (Big Endian). The server reads the opcode and payload size straight from
//! the header, so routing never needs to touch the payload.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    FrameFlags, Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed 24-byte frame header (Big Endian network byte order).
///
/// Fields are stored as byte arrays so every 24-byte pattern is a valid
/// header; validation of magic, version and size happens in
/// [`FrameHeader::from_bytes`].
///
/// `session_id` is zero on client-originated frames. The server stamps the
/// origin session on every frame it relays, so a receiver can tell which
/// connection produced it without trusting payload fields.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],             // 0x524C4842 ("RLHB")
    version: u8,                // 0x01
    flags: u8,                  // FrameFlags bitfield
    pub(crate) opcode: [u8; 2], // u16 operation code
    pub(crate) payload_size: [u8; 4],
    session_id: [u8; 8], // origin session, stamped by the server
    reserved: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header.
    pub const SIZE: usize = 24;

    /// Magic number: "RLHB" in ASCII.
    pub const MAGIC: u32 = 0x524C_4842;

    /// Current protocol version.
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (100 MiB). Screen frames are large.
    pub const MAX_PAYLOAD_SIZE: u32 = 100 * 1024 * 1024;

    /// Create a new header with the specified opcode.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            flags: 0,
            opcode: opcode.to_u16().to_be_bytes(),
            payload_size: [0; 4],
            session_id: [0; 8],
            reserved: [0; 4],
        }
    }

    /// Parse a header from the front of `bytes` without copying.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than [`Self::SIZE`] bytes
    /// - `ProtocolError::InvalidMagic` if the magic number is wrong
    /// - `ProtocolError::UnsupportedVersion` for any other version
    /// - `ProtocolError::PayloadTooLarge` if the claimed size exceeds
    ///   [`Self::MAX_PAYLOAD_SIZE`]
    ///
    /// The size check runs here, before any payload buffer is allocated, so
    /// an oversized claim is rejected at the transport boundary.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let (header, _) = Self::ref_from_prefix(bytes).map_err(|_| {
            ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol magic number.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Frame processing flags.
    #[must_use]
    pub fn flags(&self) -> FrameFlags {
        FrameFlags::from_byte(self.flags)
    }

    /// Operation code as raw u16.
    #[must_use]
    pub fn opcode(&self) -> u16 {
        u16::from_be_bytes(self.opcode)
    }

    /// Operation code as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode())
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Origin session stamped by the server (0 if unstamped).
    #[must_use]
    pub fn session_id(&self) -> u64 {
        u64::from_be_bytes(self.session_id)
    }

    /// Update frame processing flags.
    pub fn set_flags(&mut self, flags: FrameFlags) {
        self.flags = flags.to_byte();
    }

    /// Stamp the origin session.
    pub fn set_session_id(&mut self, session_id: u64) {
        self.session_id = session_id.to_be_bytes();
    }

    /// Set payload size.
    pub fn set_payload_size(&mut self, size: u32) {
        self.payload_size = size.to_be_bytes();
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("magic", &format!("{:#010x}", self.magic()))
            .field("version", &self.version())
            .field("flags", &self.flags())
            .field("opcode", &format!("{:#06x}", self.opcode()))
            .field("payload_size", &self.payload_size())
            .field("session_id", &self.session_id())
            .finish_non_exhaustive()
    }
}
