//! Relayhub core logic.
//!
//! Pure, I/O-free rules shared by the server and its test harness:
//!
//! - [`role`]: name normalization and the role classifier
//! - [`permission`]: which monitors may observe which nodes
//! - [`env`]: time and randomness abstraction for deterministic testing
//! - [`error`]: the relay error taxonomy
//!
//! Nothing here owns connection state. The server driver applies the
//! verdicts produced here to its registry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod permission;
pub mod role;

pub use env::Environment;
pub use error::RelayError;
pub use permission::{Grant, GrantParseError, PermissionPolicy, StaticPermissions};
pub use role::{ClassifierConfig, KeyDigest, Role, Verdict, classify, normalize_name};
