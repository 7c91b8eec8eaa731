//! Error taxonomy for relay operations.
//!
//! Every variant is scoped to a single connection. None of them is fatal to
//! the process; the driver maps each one to a fixed reaction:
//!
//! | Variant | Reaction |
//! |---|---|
//! | `AuthenticationFailed` | alert, then terminate the connection |
//! | `RoleConflict` | ignore silently, log only |
//! | `RecipientUnavailable` | drop silently, log only |
//! | `PayloadTooLarge` | connection fault, disconnect |
//! | `InvalidName` | ignore the claim, log only |

use thiserror::Error;

/// Errors raised by classification and routing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// Supervisor claim with a missing or wrong key
    #[error("authentication failed for reserved name '{name}'")]
    AuthenticationFailed {
        /// Normalized name that was claimed
        name: String,
    },

    /// Action requires a role the connection does not hold
    #[error("session {session_id} lacks the role required for {action}")]
    RoleConflict {
        /// Offending session
        session_id: u64,
        /// Attempted action
        action: &'static str,
    },

    /// Target of a command or relay is no longer connected
    #[error("recipient {0} unavailable")]
    RecipientUnavailable(u64),

    /// Payload exceeds the transport limit
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Offending size
        size: usize,
        /// Limit
        max: usize,
    },

    /// Claimed name is empty after normalization
    #[error("invalid name: {0:?}")]
    InvalidName(String),
}

impl RelayError {
    /// The connection must be terminated after this error.
    pub fn terminates_connection(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::PayloadTooLarge { .. })
    }

    /// The actor must not be told about this error.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::RoleConflict { .. } | Self::RecipientUnavailable(_))
    }
}
