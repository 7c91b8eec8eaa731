//! Relay payloads produced by nodes.
//!
//! Every relay payload names its subject (the producing node). The server
//! checks the subject against the sender's registered name before fanning
//! the frame out, and forwards the original bytes unchanged.

use serde::{Deserialize, Serialize};

/// Screen capture tile. Delivered best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenFrame {
    /// Producing node name
    pub subject: String,
    /// Encoded image bytes
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// Periodic sensor or location sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Producing node name
    pub subject: String,
    /// Sample type (e.g. "gps")
    pub kind: String,
    /// Structured sample body
    pub data: ciborium::Value,
}

/// One record inside an [`ActivityBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Record text
    pub message: String,
}

/// Several activity records sent in one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityBatch {
    /// Producing node name
    pub subject: String,
    /// Activity category (e.g. "notification", "keystroke")
    pub kind: String,
    /// Records in node order
    pub records: Vec<ActivityRecord>,
}

/// Single activity record as delivered to supervisors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
    /// Server wall clock at relay time, Unix milliseconds
    pub timestamp_ms: u64,
    /// Producing node name
    pub subject: String,
    /// Activity category copied from the batch
    pub kind: String,
    /// Record text
    pub message: String,
}

/// Subject-only view of any relay payload.
///
/// Deserializing into this skips every other field, so the server can check
/// a screen frame's subject without materializing the image.
#[derive(Debug, Deserialize)]
pub(crate) struct RelaySubject {
    pub(crate) subject: String,
}
