//! Deterministic simulation harness for relayhub testing.
//!
//! Runs the Sans-IO [`ServerDriver`](relayhub_server::ServerDriver) without
//! sockets: [`SimEnv`] supplies a virtual clock and seeded randomness,
//! [`SimHub`] executes driver actions against in-memory inboxes.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the routing
//! rules. Operations are applied to both the model and the simulated hub,
//! and their observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after any
//! sequence of events. Use [`InvariantRegistry::standard()`] for the routing
//! and lifecycle invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_env;
pub mod sim_hub;

pub use invariants::{
    GroupTagConsistency, HubSnapshot, Invariant, InvariantRegistry, InvariantResult,
    NoStrayDelivery, RelayScope, RoleIndexConsistency, SessionSnapshot, SingleRoleAssignment,
    SupervisorPresenceAccuracy, Violation,
};
pub use model::{
    HubWorld, Identity, ModelHub, ObservableState, Operation, Recipients, Slot, model_config,
};
pub use sim_env::{SIM_EPOCH_MILLIS, SimEnv, SimInstant};
pub use sim_hub::{Delivered, Inbox, SimHub};
