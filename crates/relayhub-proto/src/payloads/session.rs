//! Session control payloads: role claims, alerts, presence of supervisors,
//! and monitor visibility.

use serde::{Deserialize, Serialize};

/// Role as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    /// Privileged controller
    Supervisor,
    /// Read-only observer
    Monitor,
    /// Data producer
    Node,
}

/// Client asks to be classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRole {
    /// Display name; normalized by the server
    pub name: String,
    /// Supervisor secret, only meaningful for the reserved name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Node network type (e.g. "wifi", "cellular"), announced to supervisors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_type: Option<String>,
}

/// Server confirmation of the assigned role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssigned {
    /// Assigned role
    pub role: RoleKind,
    /// Normalized name the server registered
    pub name: String,
}

/// Notice sent immediately before the server terminates a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAlert {
    /// Human-readable reason
    pub reason: String,
}

/// Supervisor presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// At least one supervisor is connected
    pub admin_present: bool,
}

/// Monitor hides or unhides itself from relay fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetVisibility {
    /// Suppress relay delivery to this monitor
    pub hidden: bool,
}
