//! Operations applied to the simulated hub.
//!
//! `HubWorld` mirrors [`ModelHub`](super::ModelHub)'s interface on top of a
//! real [`SimHub`]: same slots, same operations, and the same
//! [`Recipients`] answer read back from the session inboxes.

use std::{collections::BTreeMap, time::Duration};

use relayhub_core::{ClassifierConfig, Role};
use relayhub_proto::Opcode;
use relayhub_server::{DriverConfig, DriverError};

use super::{
    ABSENT_TARGET, MODEL_ECO_DELAY, MODEL_SUPERVISOR_KEY, ObservableState, Operation, Recipients,
    SPOOFED_SUBJECT, Slot,
};
use crate::SimHub;

/// Action name that never schedules a follow-up.
const PLAIN_ACTION: &str = "LOCK_SCREEN";

/// Driver configuration model runs use.
pub fn model_config() -> DriverConfig {
    DriverConfig {
        classifier: ClassifierConfig::default().with_supervisor_key(MODEL_SUPERVISOR_KEY),
        eco_delay: MODEL_ECO_DELAY,
        ..DriverConfig::default()
    }
}

/// Simulated hub driven by model operations.
pub struct HubWorld {
    hub: SimHub,
    slots: BTreeMap<Slot, u64>,
}

impl HubWorld {
    /// World over a fresh hub.
    pub fn new(seed: u64) -> Self {
        Self { hub: SimHub::with_seed(model_config(), seed), slots: BTreeMap::new() }
    }

    /// The simulated hub.
    pub fn hub(&self) -> &SimHub {
        &self.hub
    }

    /// Session ID occupying `slot`.
    pub fn session_in(&self, slot: Slot) -> Option<u64> {
        self.slots.get(&slot).copied()
    }

    /// Apply an operation and return who received its data.
    ///
    /// Operations that make no sense in the current state (a claim from an
    /// empty slot) are skipped, as the model skips them.
    pub fn apply(&mut self, op: &Operation) -> Result<Recipients, DriverError> {
        let data = data_opcode(op);
        let before: BTreeMap<u64, usize> =
            self.slots.values().map(|&id| (id, self.hub.received_count(id))).collect();

        match *op {
            Operation::Connect { slot } => {
                if !self.slots.contains_key(&slot) {
                    let id = self.hub.connect()?;
                    self.slots.insert(slot, id);
                }
            },
            Operation::Claim { slot, identity } => {
                if let Some(id) = self.session_in(slot) {
                    self.hub.claim(id, identity.name(), identity.key())?;
                }
            },
            Operation::Screen { slot, spoof } => {
                if let Some(id) = self.session_in(slot) {
                    let subject = if spoof {
                        SPOOFED_SUBJECT.to_string()
                    } else {
                        self.registered_name(id).unwrap_or_default()
                    };
                    self.hub.screen(id, &subject, vec![0xAB; 16])?;
                }
            },
            Operation::Activity { slot, records } => {
                if let Some(id) = self.session_in(slot) {
                    let subject = self.registered_name(id).unwrap_or_default();
                    let messages = vec!["event"; usize::from(records)];
                    self.hub.activity(id, &subject, "sms", &messages)?;
                }
            },
            Operation::SetHidden { slot, hidden } => {
                if let Some(id) = self.session_in(slot) {
                    self.hub.set_hidden(id, hidden)?;
                }
            },
            Operation::Command { slot, target, live } => {
                if let Some(id) = self.session_in(slot) {
                    let target = target.map(|t| self.session_in(t).unwrap_or(ABSENT_TARGET));
                    let action = if live { "START_LIVE" } else { PLAIN_ACTION };
                    self.hub.command(id, target, action)?;
                }
            },
            Operation::Disconnect { slot } => {
                if let Some(id) = self.slots.remove(&slot) {
                    self.hub.disconnect(id)?;
                }
            },
            Operation::AdvanceTime { secs } => {
                self.hub.advance(Duration::from_secs(u64::from(secs)))?;
            },
        }

        let recipients = before
            .into_iter()
            .filter(|&(id, seen)| {
                let Some(opcode) = data else { return false };
                self.hub.received(id).iter().skip(seen).any(|p| p.opcode() == opcode)
            })
            .map(|(id, _)| id)
            .collect();

        self.slots.retain(|_, id| self.hub.is_open(*id));
        Ok(recipients)
    }

    /// Observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        let driver = self.hub.driver();
        ObservableState {
            sessions: self
                .slots
                .values()
                .map(|&id| (id, driver.role(id).and_then(Role::kind)))
                .collect(),
            supervisor_present: driver.supervisor_present(),
            pending_follow_ups: driver.pending_delayed_commands(),
        }
    }

    /// Name the session claimed, as the relay subject it would send.
    fn registered_name(&self, session_id: u64) -> Option<String> {
        self.hub.driver().session(session_id).and_then(|info| info.name.clone())
    }
}

/// Opcode whose arrival counts as this operation's data.
fn data_opcode(op: &Operation) -> Option<Opcode> {
    match op {
        Operation::Screen { .. } => Some(Opcode::ScreenFrame),
        Operation::Activity { .. } => Some(Opcode::ActivityLog),
        Operation::Command { .. } | Operation::AdvanceTime { .. } => Some(Opcode::Command),
        _ => None,
    }
}

impl std::fmt::Debug for HubWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubWorld").field("hub", &self.hub).field("slots", &self.slots).finish()
    }
}
