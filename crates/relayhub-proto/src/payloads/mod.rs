//! CBOR-encoded protocol messages.
//!
//! Frame headers are raw binary, payloads are CBOR. The opcode in the header
//! identifies the payload type, so only the inner struct is serialized (no
//! variant tag).
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one opcode (enforced by match
//! exhaustiveness). Decoding an encoded payload with its own opcode yields
//! an equal value.

pub mod command;
pub mod relay;
pub mod session;

use bytes::BufMut;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameFlags, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    // Session control
    /// Role claim
    ClaimRole(session::ClaimRole),
    /// Role confirmation
    RoleAssigned(session::RoleAssigned),
    /// Termination notice
    SystemAlert(session::SystemAlert),
    /// Supervisor presence
    StatusUpdate(session::StatusUpdate),
    /// Monitor visibility toggle
    SetVisibility(session::SetVisibility),

    // Relay data
    /// Screen capture tile
    ScreenFrame(relay::ScreenFrame),
    /// Sensor/location sample
    Sample(relay::Sample),
    /// Activity record batch
    ActivityBatch(relay::ActivityBatch),
    /// Expanded activity record
    ActivityLog(relay::ActivityLog),

    // Commands
    /// Supervisor command
    Command(command::Command),
    /// Node presence announcement
    NodePresence(command::NodePresence),

    /// Error response
    Error(ErrorPayload),
}

/// Error payload for error frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code identifying the type of error.
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorPayload {
    /// Payload could not be decoded for its opcode.
    pub const INVALID_PAYLOAD: u16 = 0x0001;
    /// Opcode is not accepted from clients.
    pub const UNSUPPORTED_OPCODE: u16 = 0x0002;

    /// Create an invalid payload error.
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self { code: Self::INVALID_PAYLOAD, message: msg.into() }
    }

    /// Create an unsupported opcode error.
    pub fn unsupported_opcode(opcode: u16) -> Self {
        Self {
            code: Self::UNSUPPORTED_OPCODE,
            message: format!("unsupported opcode {opcode:#06x}"),
        }
    }
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

impl Payload {
    /// Opcode corresponding to this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::ClaimRole(_) => Opcode::ClaimRole,
            Self::RoleAssigned(_) => Opcode::RoleAssigned,
            Self::SystemAlert(_) => Opcode::SystemAlert,
            Self::StatusUpdate(_) => Opcode::StatusUpdate,
            Self::SetVisibility(_) => Opcode::SetVisibility,
            Self::ScreenFrame(_) => Opcode::ScreenFrame,
            Self::Sample(_) => Opcode::Sample,
            Self::ActivityBatch(_) => Opcode::ActivityBatch,
            Self::ActivityLog(_) => Opcode::ActivityLog,
            Self::Command(_) => Opcode::Command,
            Self::NodePresence(_) => Opcode::NodePresence,
            Self::Error(_) => Opcode::Error,
        }
    }

    /// Encode payload to buffer.
    ///
    /// Size limits are not checked here; [`Frame::encode`] enforces them.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();

        match self {
            Self::ClaimRole(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::RoleAssigned(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::SystemAlert(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::StatusUpdate(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::SetVisibility(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::ScreenFrame(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Sample(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::ActivityBatch(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::ActivityLog(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Command(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::NodePresence(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Error(inner) => ciborium::ser::into_writer(inner, &mut writer),
        }
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Decode payload bytes for the given opcode.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if bytes exceed the frame limit
    /// - `ProtocolError::CborDecode` if CBOR deserialization fails
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match opcode {
            Opcode::ClaimRole => Self::ClaimRole(from_cbor(bytes)?),
            Opcode::RoleAssigned => Self::RoleAssigned(from_cbor(bytes)?),
            Opcode::SystemAlert => Self::SystemAlert(from_cbor(bytes)?),
            Opcode::StatusUpdate => Self::StatusUpdate(from_cbor(bytes)?),
            Opcode::SetVisibility => Self::SetVisibility(from_cbor(bytes)?),
            Opcode::ScreenFrame => Self::ScreenFrame(from_cbor(bytes)?),
            Opcode::Sample => Self::Sample(from_cbor(bytes)?),
            Opcode::ActivityBatch => Self::ActivityBatch(from_cbor(bytes)?),
            Opcode::ActivityLog => Self::ActivityLog(from_cbor(bytes)?),
            Opcode::Command => Self::Command(from_cbor(bytes)?),
            Opcode::NodePresence => Self::NodePresence(from_cbor(bytes)?),
            Opcode::Error => Self::Error(from_cbor(bytes)?),
        };

        Ok(payload)
    }

    /// Convert payload into a transport frame.
    ///
    /// Screen frames are marked [`FrameFlags::VOLATILE`].
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;

        let opcode = self.opcode();
        let mut header = FrameHeader::new(opcode);
        if opcode == Opcode::ScreenFrame {
            header.set_flags(header.flags().with(FrameFlags::VOLATILE));
        }

        Ok(Frame::new(header, buf))
    }

    /// Parse payload from a transport frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the header opcode is not recognized
    /// - any error from [`Payload::decode`]
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or(ProtocolError::UnknownOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }

    /// Read only the `subject` field of a relay frame's payload.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborDecode` if the payload has no string `subject`
    pub fn relay_subject(frame: &Frame) -> Result<String> {
        from_cbor::<relay::RelaySubject>(&frame.payload).map(|s| s.subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_role_round_trip() {
        let payload = Payload::ClaimRole(session::ClaimRole {
            name: "sarah_phone1".to_string(),
            key: None,
            net_type: Some("cellular".to_string()),
        });

        let frame = payload.clone().into_frame().expect("should create frame");
        assert_eq!(frame.header.opcode_enum(), Some(Opcode::ClaimRole));
        assert_eq!(Payload::from_frame(&frame).expect("should parse"), payload);
    }

    #[test]
    fn screen_frames_are_volatile() {
        let frame = Payload::ScreenFrame(relay::ScreenFrame {
            subject: "sarah_phone1".to_string(),
            data: vec![0xFF; 64],
        })
        .into_frame()
        .unwrap();

        assert!(frame.header.flags().contains(FrameFlags::VOLATILE));
    }

    #[test]
    fn samples_are_not_volatile() {
        let frame = Payload::Sample(relay::Sample {
            subject: "sarah_phone1".to_string(),
            kind: "gps".to_string(),
            data: ciborium::Value::Array(vec![
                ciborium::Value::Float(51.5),
                ciborium::Value::Float(-0.12),
            ]),
        })
        .into_frame()
        .unwrap();

        assert!(!frame.header.flags().contains(FrameFlags::VOLATILE));
    }

    #[test]
    fn relay_subject_skips_image_bytes() {
        let frame = Payload::ScreenFrame(relay::ScreenFrame {
            subject: "john_laptop".to_string(),
            data: vec![7; 4096],
        })
        .into_frame()
        .unwrap();

        assert_eq!(Payload::relay_subject(&frame).unwrap(), "john_laptop");
    }

    #[test]
    fn relay_subject_rejects_payload_without_subject() {
        let frame = Payload::StatusUpdate(session::StatusUpdate { admin_present: true })
            .into_frame()
            .unwrap();

        assert!(matches!(Payload::relay_subject(&frame), Err(ProtocolError::CborDecode(_))));
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let mut frame = Payload::Error(ErrorPayload::invalid_payload("x")).into_frame().unwrap();
        frame.header.opcode = 0x7777u16.to_be_bytes();

        assert_eq!(Payload::from_frame(&frame), Err(ProtocolError::UnknownOpcode(0x7777)));
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let mut header = FrameHeader::new(Opcode::Command);
        header.set_payload_size(3);
        let frame = Frame::new(header, vec![0xFF, 0x00, 0x13]);

        assert!(matches!(Payload::from_frame(&frame), Err(ProtocolError::CborDecode(_))));
    }
}
