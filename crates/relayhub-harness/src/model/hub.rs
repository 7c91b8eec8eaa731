//! Reference model of the hub.
//!
//! A deliberately naive re-statement of the routing rules: no indexes, no
//! frames, just slots and names. Model-based tests apply the same
//! [`Operation`]s here and to a [`HubWorld`](super::HubWorld) and require
//! both to agree on who received what.

use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use relayhub_proto::payloads::session::RoleKind;

use super::{Identity, Operation, SPOOFED_SUBJECT, Slot};

/// Delay before the follow-up command fires.
pub const MODEL_ECO_DELAY: Duration = Duration::from_secs(300);

/// Session ID used for a command aimed at an empty slot.
pub const ABSENT_TARGET: u64 = u64::MAX;

/// Result of one operation: data recipients by session ID.
///
/// Data means screen frames for `Screen`, activity logs for `Activity`, and
/// commands for `Command` and `AdvanceTime`. Control traffic (status,
/// presence, role confirmations) is not counted.
pub type Recipients = BTreeSet<u64>;

/// What both implementations must agree on after every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Open sessions and their roles.
    pub sessions: BTreeMap<u64, Option<RoleKind>>,
    /// At least one supervisor is connected.
    pub supervisor_present: bool,
    /// Follow-up commands not yet fired.
    pub pending_follow_ups: usize,
}

#[derive(Debug, Clone)]
struct ModelSession {
    id: u64,
    role: Option<RoleKind>,
    name: String,
    hidden: bool,
}

/// Reference hub.
#[derive(Debug, Clone, Default)]
pub struct ModelHub {
    slots: BTreeMap<Slot, ModelSession>,
    next_id: u64,
    now: Duration,
    follow_ups: Vec<(Duration, Option<u64>)>,
}

impl ModelHub {
    /// Empty hub.
    pub fn new() -> Self {
        Self { next_id: 1, ..Self::default() }
    }

    /// Session ID occupying `slot`.
    pub fn session_in(&self, slot: Slot) -> Option<u64> {
        self.slots.get(&slot).map(|s| s.id)
    }

    /// Apply an operation and return who received its data.
    pub fn apply(&mut self, op: &Operation) -> Recipients {
        match *op {
            Operation::Connect { slot } => {
                if !self.slots.contains_key(&slot) {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.slots.insert(slot, ModelSession {
                        id,
                        role: None,
                        name: String::new(),
                        hidden: false,
                    });
                }
                Recipients::new()
            },
            Operation::Claim { slot, identity } => {
                self.claim(slot, identity);
                Recipients::new()
            },
            Operation::Screen { slot, spoof } => match self.sender(slot, RoleKind::Node) {
                Some(name) if !spoof => self.observers(&name),
                _ => Recipients::new(),
            },
            Operation::Activity { slot, records } => match self.sender(slot, RoleKind::Node) {
                Some(_) if records > 0 => self.supervisors(),
                _ => Recipients::new(),
            },
            Operation::SetHidden { slot, hidden } => {
                if let Some(session) =
                    self.slots.get_mut(&slot).filter(|s| s.role == Some(RoleKind::Monitor))
                {
                    session.hidden = hidden;
                }
                Recipients::new()
            },
            Operation::Command { slot, target, live } => {
                if self.sender(slot, RoleKind::Supervisor).is_none() {
                    return Recipients::new();
                }
                let target = target.map(|t| self.session_in(t).unwrap_or(ABSENT_TARGET));
                if live {
                    self.follow_ups.push((self.now + MODEL_ECO_DELAY, target));
                }
                self.nodes_addressed(target)
            },
            Operation::Disconnect { slot } => {
                self.slots.remove(&slot);
                Recipients::new()
            },
            Operation::AdvanceTime { secs } => {
                self.now += Duration::from_secs(u64::from(secs));
                let now = self.now;
                let (due, pending): (Vec<_>, Vec<_>) =
                    self.follow_ups.drain(..).partition(|(at, _)| *at <= now);
                self.follow_ups = pending;

                due.into_iter().flat_map(|(_, target)| self.nodes_addressed(target)).collect()
            },
        }
    }

    /// Observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            sessions: self.slots.values().map(|s| (s.id, s.role)).collect(),
            supervisor_present: !self.supervisors().is_empty(),
            pending_follow_ups: self.follow_ups.len(),
        }
    }

    fn claim(&mut self, slot: Slot, identity: Identity) {
        if !self.slots.get(&slot).is_some_and(|s| s.role.is_none()) {
            return;
        }

        let role = match identity {
            Identity::Impostor => {
                self.slots.remove(&slot);
                return;
            },
            Identity::Admin => RoleKind::Supervisor,
            other if other.name().contains('_') => RoleKind::Node,
            _ => RoleKind::Monitor,
        };

        if let Some(session) = self.slots.get_mut(&slot) {
            session.role = Some(role);
            session.name = identity.name().to_lowercase();
        }
    }

    /// Name of the session in `slot` if it holds `role`.
    fn sender(&self, slot: Slot, role: RoleKind) -> Option<String> {
        self.slots.get(&slot).filter(|s| s.role == Some(role)).map(|s| s.name.clone())
    }

    fn supervisors(&self) -> Recipients {
        self.slots.values().filter(|s| s.role == Some(RoleKind::Supervisor)).map(|s| s.id).collect()
    }

    fn observers(&self, subject: &str) -> Recipients {
        debug_assert_ne!(subject, SPOOFED_SUBJECT);

        let mut recipients = self.supervisors();
        recipients.extend(
            self.slots
                .values()
                .filter(|s| s.role == Some(RoleKind::Monitor) && !s.hidden)
                .filter(|s| subject.starts_with(&format!("{}_", s.name)))
                .map(|s| s.id),
        );
        recipients
    }

    fn nodes_addressed(&self, target: Option<u64>) -> Recipients {
        self.slots
            .values()
            .filter(|s| s.role == Some(RoleKind::Node))
            .filter(|s| target.is_none_or(|t| t == s.id))
            .map(|s| s.id)
            .collect()
    }
}
