//! Operations for model-based testing.
//!
//! Operations are generated randomly (proptest strategies or `arbitrary`
//! for fuzzing) and applied to both the reference model and the simulated
//! hub. Connections live in a small number of slots so sequences revisit
//! the same peers often.

use arbitrary::Arbitrary;

/// Connection slot (clamped to the slot count by the caller).
pub type Slot = u8;

/// Supervisor key every model run is configured with.
pub const MODEL_SUPERVISOR_KEY: &str = "model-key";

/// Name a node uses when pretending to be someone else.
pub const SPOOFED_SUBJECT: &str = "mallory_phone";

/// Names a slot can claim.
///
/// Two owners, their devices, and a node whose name only looks like one of
/// sarah's, so prefix permissions have both matches and near misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Identity {
    /// Supervisor with the right key
    Admin,
    /// Supervisor name with a wrong key
    Impostor,
    /// Monitor `sarah`
    Sarah,
    /// Monitor `john`
    John,
    /// Node owned by sarah
    SarahPhone,
    /// Another node owned by sarah
    SarahLaptop,
    /// Node owned by john
    JohnPhone,
    /// Node whose owner never connects
    SarahsonTablet,
}

impl Identity {
    /// Every identity.
    pub const ALL: [Self; 8] = [
        Self::Admin,
        Self::Impostor,
        Self::Sarah,
        Self::John,
        Self::SarahPhone,
        Self::SarahLaptop,
        Self::JohnPhone,
        Self::SarahsonTablet,
    ];

    /// Claimed name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Admin | Self::Impostor => "admin",
            Self::Sarah => "sarah",
            Self::John => "john",
            Self::SarahPhone => "sarah_phone",
            Self::SarahLaptop => "Sarah_Laptop",
            Self::JohnPhone => "john_phone",
            Self::SarahsonTablet => "sarahson_tablet",
        }
    }

    /// Key sent with the claim.
    pub fn key(self) -> Option<&'static str> {
        match self {
            Self::Admin => Some(MODEL_SUPERVISOR_KEY),
            Self::Impostor => Some("guess"),
            _ => None,
        }
    }
}

/// Operations that can be applied to the hub.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Open a connection in an empty slot.
    Connect {
        /// Slot to connect.
        slot: Slot,
    },

    /// Claim a role from a connected slot.
    Claim {
        /// Claiming slot.
        slot: Slot,
        /// Name (and key) to claim.
        identity: Identity,
    },

    /// Node sends a screen frame.
    Screen {
        /// Sending slot.
        slot: Slot,
        /// Use another node's name as the subject.
        spoof: bool,
    },

    /// Node sends an activity batch.
    Activity {
        /// Sending slot.
        slot: Slot,
        /// Number of records (kept small).
        records: u8,
    },

    /// Monitor hides or unhides itself.
    SetHidden {
        /// Monitor slot.
        slot: Slot,
        /// New visibility.
        hidden: bool,
    },

    /// Supervisor issues a command.
    Command {
        /// Supervisor slot.
        slot: Slot,
        /// Target slot, or every node.
        target: Option<Slot>,
        /// Send the action that schedules a follow-up.
        live: bool,
    },

    /// Peer disconnects.
    Disconnect {
        /// Slot to disconnect.
        slot: Slot,
    },

    /// Advance simulation time, then tick.
    AdvanceTime {
        /// Seconds to advance.
        secs: u16,
    },
}

impl Operation {
    /// Same operation with every slot reduced modulo `slots`.
    pub fn clamp_slots(self, slots: u8) -> Self {
        let slots = slots.max(1);
        let c = |slot: Slot| slot % slots;

        match self {
            Self::Connect { slot } => Self::Connect { slot: c(slot) },
            Self::Claim { slot, identity } => Self::Claim { slot: c(slot), identity },
            Self::Screen { slot, spoof } => Self::Screen { slot: c(slot), spoof },
            Self::Activity { slot, records } => {
                Self::Activity { slot: c(slot), records: records % 4 }
            },
            Self::SetHidden { slot, hidden } => Self::SetHidden { slot: c(slot), hidden },
            Self::Command { slot, target, live } => {
                Self::Command { slot: c(slot), target: target.map(c), live }
            },
            Self::Disconnect { slot } => Self::Disconnect { slot: c(slot) },
            Self::AdvanceTime { secs } => Self::AdvanceTime { secs },
        }
    }
}
