//! Model-based testing for the hub.
//!
//! [`ModelHub`] restates the routing rules in the simplest possible form.
//! [`HubWorld`] drives the real driver through a [`SimHub`](crate::SimHub).
//! Tests apply the same [`Operation`] sequence to both and compare
//! recipients and [`ObservableState`] after every step.

mod hub;
mod operation;
mod world;

pub use hub::{ABSENT_TARGET, MODEL_ECO_DELAY, ModelHub, ObservableState, Recipients};
pub use operation::{Identity, MODEL_SUPERVISOR_KEY, Operation, SPOOFED_SUBJECT, Slot};
pub use world::{HubWorld, model_config};
