//! Supervisor commands and announcements.

use serde::{Deserialize, Serialize};

/// Command from a supervisor to one node or to every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Target session, or `None` to broadcast to all nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    /// Opaque action string (e.g. "START_LIVE")
    pub action: String,
}

/// Node joined or left. Sent to supervisors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePresence {
    /// Node's session, usable as a command target
    pub session_id: u64,
    /// Node's registered name
    pub name: String,
    /// Network type the node reported when claiming its role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_type: Option<String>,
    /// `true` on join, `false` on disconnect
    pub online: bool,
}
