//! Connection registry for session and role tracking.
//!
//! The registry maintains bidirectional mappings: session → info (for
//! lookups) and role → sessions (for fan-out). Both are updated together so
//! a disconnected session can never linger in a role index.
//!
//! A session starts `Unassigned` and may be assigned a role exactly once.
//! Unregistering removes it from every index.

use std::collections::{BTreeSet, HashMap};

use relayhub_core::Role;

/// Information about a registered session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Assigned role
    pub role: Role,
    /// Normalized name, set on role assignment
    pub name: Option<String>,
    /// Group tag (monitor name, or node owner prefix)
    pub group: Option<String>,
    /// Network type reported by a node
    pub net_type: Option<String>,
    /// Monitor opted out of deliveries
    pub hidden: bool,
}

impl SessionInfo {
    /// Create a new unassigned session info.
    pub fn new() -> Self {
        Self::default()
    }

    /// Monitor that currently accepts deliveries.
    pub fn is_visible_monitor(&self) -> bool {
        self.role == Role::Monitor && !self.hidden
    }
}

/// Role assignment for a registered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Role to assign
    pub role: Role,
    /// Normalized name
    pub name: String,
    /// Group tag
    pub group: Option<String>,
    /// Node network type
    pub net_type: Option<String>,
}

/// Registry for tracking sessions and their roles.
///
/// Role sets are ordered so fan-out order is deterministic.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Session ID → session info
    sessions: HashMap<u64, SessionInfo>,
    /// Role → session IDs holding it (never contains `Unassigned`)
    by_role: HashMap<Role, BTreeSet<u64>>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new unassigned session.
    ///
    /// Returns `false` if the session already exists.
    pub fn register_session(&mut self, session_id: u64) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }

        self.sessions.insert(session_id, SessionInfo::new());
        true
    }

    /// Unregister a session and remove it from its role index.
    ///
    /// Idempotent: returns `None` if the session was not registered.
    pub fn unregister_session(&mut self, session_id: u64) -> Option<SessionInfo> {
        let info = self.sessions.remove(&session_id)?;

        if let Some(members) = self.by_role.get_mut(&info.role) {
            members.remove(&session_id);
            if members.is_empty() {
                self.by_role.remove(&info.role);
            }
        }

        Some(info)
    }

    /// Session metadata. `None` if session doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.sessions.get(&session_id)
    }

    /// Check if a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Role of a session. `None` if session doesn't exist.
    pub fn role(&self, session_id: u64) -> Option<Role> {
        self.sessions.get(&session_id).map(|info| info.role)
    }

    /// Assign a role to an unassigned session.
    ///
    /// Returns `false` if the session doesn't exist, already holds a role, or
    /// the assignment is `Unassigned`.
    pub fn assign_role(&mut self, session_id: u64, assignment: Assignment) -> bool {
        if assignment.role == Role::Unassigned {
            return false;
        }

        let Some(info) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        if info.role != Role::Unassigned {
            return false;
        }

        info.role = assignment.role;
        info.name = Some(assignment.name);
        info.group = assignment.group;
        info.net_type = assignment.net_type;
        info.hidden = false;

        self.by_role.entry(assignment.role).or_default().insert(session_id);
        true
    }

    /// Toggle monitor visibility.
    ///
    /// Returns `false` if the session is not a monitor.
    pub fn set_hidden(&mut self, session_id: u64, hidden: bool) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(info) if info.role == Role::Monitor => {
                info.hidden = hidden;
                true
            },
            _ => false,
        }
    }

    /// All sessions holding `role`, in ascending ID order.
    ///
    /// `Unassigned` sessions are not indexed and yield nothing.
    pub fn sessions_with_role(&self, role: Role) -> impl Iterator<Item = u64> + '_ {
        self.by_role.get(&role).into_iter().flat_map(|s| s.iter().copied())
    }

    /// All supervisor sessions.
    pub fn supervisors(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions_with_role(Role::Supervisor)
    }

    /// At least one supervisor is connected.
    pub fn supervisor_present(&self) -> bool {
        self.role_count(Role::Supervisor) > 0
    }

    /// All registered sessions, in ascending ID order.
    pub fn session_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over sessions and their info in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &SessionInfo)> + '_ {
        self.sessions.iter().map(|(id, info)| (*id, info))
    }

    /// Total number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of sessions holding `role`.
    pub fn role_count(&self, role: Role) -> usize {
        match role {
            Role::Unassigned => {
                self.sessions.values().filter(|info| info.role == Role::Unassigned).count()
            },
            _ => self.by_role.get(&role).map_or(0, BTreeSet::len),
        }
    }
}
