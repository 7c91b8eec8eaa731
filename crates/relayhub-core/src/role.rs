//! Role classification.
//!
//! A connection becomes a Supervisor, Monitor or Node based solely on the
//! name it claims (and, for the reserved supervisor name, a secret key).
//! Classification is a pure function; the server driver decides what to do
//! with the verdict.
//!
//! Rules, evaluated in order on the normalized name:
//!
//! 1. Reserved supervisor name: `Supervisor` iff the key matches, otherwise
//!    [`RelayError::AuthenticationFailed`].
//! 2. No [`GROUP_SEPARATOR`]: `Monitor`.
//! 3. Otherwise: `Node`. Node identity is asserted, not authenticated.

use relayhub_proto::payloads::session::RoleKind;
use sha2::{Digest, Sha256};

use crate::error::RelayError;

/// Separates a node's owner prefix from its device suffix (`sarah_phone1`).
pub const GROUP_SEPARATOR: char = '_';

/// Reserved supervisor name unless configured otherwise.
pub const DEFAULT_SUPERVISOR_NAME: &str = "admin";

/// Role of a connection.
///
/// `Unassigned` until the first successful claim, then terminal until
/// disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// No claim accepted yet
    #[default]
    Unassigned,
    /// Privileged controller
    Supervisor,
    /// Read-only observer
    Monitor,
    /// Data producer
    Node,
}

impl Role {
    /// Every role a claim can produce.
    pub const ASSIGNED: [Self; 3] = [Self::Supervisor, Self::Monitor, Self::Node];

    /// Wire representation. `None` for `Unassigned`.
    pub fn kind(self) -> Option<RoleKind> {
        match self {
            Self::Unassigned => None,
            Self::Supervisor => Some(RoleKind::Supervisor),
            Self::Monitor => Some(RoleKind::Monitor),
            Self::Node => Some(RoleKind::Node),
        }
    }
}

impl From<RoleKind> for Role {
    fn from(kind: RoleKind) -> Self {
        match kind {
            RoleKind::Supervisor => Self::Supervisor,
            RoleKind::Monitor => Self::Monitor,
            RoleKind::Node => Self::Node,
        }
    }
}

/// SHA-256 digest of the supervisor secret.
///
/// Only the digest is kept in memory. Comparing digests keeps the comparison
/// length-independent.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyDigest([u8; 32]);

impl KeyDigest {
    /// Digest of `secret`.
    pub fn of(secret: &str) -> Self {
        Self(Sha256::digest(secret.as_bytes()).into())
    }

    /// Constant-time check of a candidate key.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = Self::of(candidate);
        self.0.iter().zip(candidate.0.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }
}

impl std::fmt::Debug for KeyDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyDigest(<redacted>)")
    }
}

/// Classifier settings.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Reserved supervisor name (normalized on comparison)
    pub supervisor_name: String,
    /// Supervisor secret. `None` rejects every supervisor claim.
    pub supervisor_key: Option<KeyDigest>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { supervisor_name: DEFAULT_SUPERVISOR_NAME.to_string(), supervisor_key: None }
    }
}

impl ClassifierConfig {
    /// Set the supervisor secret.
    #[must_use]
    pub fn with_supervisor_key(mut self, secret: &str) -> Self {
        self.supervisor_key = Some(KeyDigest::of(secret));
        self
    }
}

/// Outcome of a successful classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Assigned role
    pub role: RoleKind,
    /// Normalized name
    pub name: String,
    /// Group tag: the monitor's own name, or the node's owner prefix.
    /// `None` for supervisors.
    pub group: Option<String>,
    /// Which rule matched
    pub reason: &'static str,
}

/// Trim and lowercase a claimed name.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Group tag of a normalized name under `role`.
pub fn group_tag(role: RoleKind, name: &str) -> Option<String> {
    match role {
        RoleKind::Supervisor => None,
        RoleKind::Monitor => Some(name.to_string()),
        RoleKind::Node => name.split(GROUP_SEPARATOR).next().map(str::to_string),
    }
}

/// Classify a role claim.
///
/// # Errors
///
/// - [`RelayError::InvalidName`] if the name is empty after normalization
/// - [`RelayError::AuthenticationFailed`] for the reserved supervisor name
///   with a missing or wrong key, or when no key is configured
pub fn classify(
    raw_name: &str,
    supplied_key: Option<&str>,
    config: &ClassifierConfig,
) -> Result<Verdict, RelayError> {
    let name = normalize_name(raw_name);
    if name.is_empty() {
        return Err(RelayError::InvalidName(raw_name.to_string()));
    }

    if name == normalize_name(&config.supervisor_name) {
        let verified = match (&config.supervisor_key, supplied_key) {
            (Some(expected), Some(candidate)) => expected.matches(candidate),
            _ => false,
        };

        if !verified {
            return Err(RelayError::AuthenticationFailed { name });
        }

        return Ok(Verdict {
            role: RoleKind::Supervisor,
            name,
            group: None,
            reason: "supervisor key verified",
        });
    }

    let (role, reason) = if name.contains(GROUP_SEPARATOR) {
        (RoleKind::Node, "name contains group separator")
    } else {
        (RoleKind::Monitor, "name has no group separator")
    };

    Ok(Verdict { role, group: group_tag(role, &name), name, reason })
}
