//! Observable state snapshots for invariant checking.
//!
//! Invariants operate on snapshots rather than live state so every check
//! sees the same instant.

use relayhub_core::{PermissionPolicy, Role};
use relayhub_proto::{
    Payload,
    payloads::session::{RoleAssigned, StatusUpdate},
};

/// Snapshot of the whole hub.
#[derive(Debug, Clone, Default)]
pub struct HubSnapshot {
    /// Every session ever opened, by ascending ID.
    pub sessions: Vec<SessionSnapshot>,
    /// Role → session IDs, as indexed by the registry.
    pub role_index: Vec<(Role, Vec<u64>)>,
    /// The driver believes a supervisor is connected.
    pub supervisor_present: bool,
    /// Permission policy in force.
    pub permissions: PermissionPolicy,
    /// Frames sent to closed or unknown sessions.
    pub stray_deliveries: usize,
}

impl HubSnapshot {
    /// Sessions that are still connected.
    pub fn open_sessions(&self) -> impl Iterator<Item = &SessionSnapshot> + '_ {
        self.sessions.iter().filter(|s| s.open)
    }
}

/// One session as seen from the outside.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Session ID.
    pub id: u64,
    /// Still connected.
    pub open: bool,
    /// Role in the registry. `None` once unregistered.
    pub registered_role: Option<Role>,
    /// Normalized name recorded at role assignment.
    pub name: Option<String>,
    /// Group tag recorded at role assignment.
    pub group: Option<String>,
    /// Decoded payloads received, oldest first.
    pub received: Vec<Payload>,
}

impl SessionSnapshot {
    /// Role assignments this session was told about.
    pub fn assignments(&self) -> impl Iterator<Item = &RoleAssigned> + '_ {
        self.received.iter().filter_map(|p| match p {
            Payload::RoleAssigned(assigned) => Some(assigned),
            _ => None,
        })
    }

    /// Most recent supervisor status received.
    pub fn last_status(&self) -> Option<StatusUpdate> {
        self.received.iter().rev().find_map(|p| match p {
            Payload::StatusUpdate(status) => Some(*status),
            _ => None,
        })
    }
}
