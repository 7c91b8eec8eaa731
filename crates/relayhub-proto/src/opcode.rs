//! Operation codes.
//!
//! Opcodes are grouped by range: `0x00xx` session control, `0x01xx` relay
//! data, `0x02xx` supervisor commands and announcements. `0xFFFF` is the
//! error frame.

/// Message type carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Client asks to be classified into a role
    ClaimRole = 0x0001,
    /// Server confirms the assigned role
    RoleAssigned = 0x0002,
    /// Server notice preceding a forced termination
    SystemAlert = 0x0003,
    /// Supervisor presence changed
    StatusUpdate = 0x0004,
    /// Monitor hides or unhides itself
    SetVisibility = 0x0005,

    /// High-frequency screen capture tile (best-effort)
    ScreenFrame = 0x0101,
    /// Periodic sensor/location sample
    Sample = 0x0102,
    /// Batch of activity records from a node
    ActivityBatch = 0x0103,
    /// Single activity record, expanded by the server
    ActivityLog = 0x0104,

    /// Supervisor command to one or all nodes
    Command = 0x0201,
    /// Node joined or left, sent to supervisors
    NodePresence = 0x0202,

    /// Error response
    Error = 0xFFFF,
}

impl Opcode {
    /// Convert from the raw wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::ClaimRole),
            0x0002 => Some(Self::RoleAssigned),
            0x0003 => Some(Self::SystemAlert),
            0x0004 => Some(Self::StatusUpdate),
            0x0005 => Some(Self::SetVisibility),
            0x0101 => Some(Self::ScreenFrame),
            0x0102 => Some(Self::Sample),
            0x0103 => Some(Self::ActivityBatch),
            0x0104 => Some(Self::ActivityLog),
            0x0201 => Some(Self::Command),
            0x0202 => Some(Self::NodePresence),
            0xFFFF => Some(Self::Error),
            _ => None,
        }
    }

    /// Raw wire value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Relay opcodes originate at nodes and fan out to observers.
    #[must_use]
    pub const fn is_relay(self) -> bool {
        matches!(self, Self::ScreenFrame | Self::Sample | Self::ActivityBatch)
    }
}
