//! Driver error types.
//!
//! Only driver-level failures surface here: events for unknown or duplicate
//! sessions, and frames the server itself failed to build. Problems caused
//! by one client's traffic are handled inside the driver (alert, close, or
//! log) and never reach the caller as errors.

use std::fmt;

/// Errors that can occur while the driver processes an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Session not found in registry.
    ///
    /// A frame arrived for a session the driver never accepted or already
    /// removed. Usually a race with disconnect; the runtime logs and moves on.
    SessionNotFound(u64),

    /// Session already registered.
    ///
    /// The runtime reused a live session ID. Session IDs must be unique, so
    /// this indicates a runtime bug.
    SessionAlreadyExists(u64),

    /// Frame encoding error.
    ///
    /// The driver could not encode a frame it generated.
    Protocol(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionAlreadyExists(id) => write!(f, "session already exists: {id}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<relayhub_proto::ProtocolError> for DriverError {
    fn from(err: relayhub_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
