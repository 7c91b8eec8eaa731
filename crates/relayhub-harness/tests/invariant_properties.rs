//! Invariant property tests.
//!
//! Invariants are checked after every operation of random sequences, with
//! and without best-effort loss. They describe what must always be true,
//! not a particular scenario.

use std::{collections::BTreeMap, time::Duration};

use proptest::prelude::*;
use relayhub_core::{Grant, PermissionPolicy};
use relayhub_harness::{
    Identity, InvariantRegistry, Operation, SimHub, Slot, model::MODEL_SUPERVISOR_KEY,
    model_config,
};
use relayhub_server::DriverConfig;

/// Applies operations straight to a hub, checking invariants as it goes.
struct Checked {
    hub: SimHub,
    slots: BTreeMap<Slot, u64>,
    invariants: InvariantRegistry,
}

impl Checked {
    fn new(config: DriverConfig, seed: u64, loss: f64) -> Self {
        let mut hub = SimHub::with_seed(config, seed);
        hub.set_best_effort_loss(loss);
        Self { hub, slots: BTreeMap::new(), invariants: InvariantRegistry::standard() }
    }

    fn apply(&mut self, op: &Operation) {
        let id = |slots: &BTreeMap<Slot, u64>, slot: Slot| slots.get(&slot).copied();

        match *op {
            Operation::Connect { slot } => {
                if id(&self.slots, slot).is_none() {
                    let session = self.hub.connect().unwrap();
                    self.slots.insert(slot, session);
                }
            },
            Operation::Claim { slot, identity } => {
                if let Some(session) = id(&self.slots, slot) {
                    self.hub.claim(session, identity.name(), identity.key()).unwrap();
                }
            },
            Operation::Screen { slot, spoof } => {
                if let Some(session) = id(&self.slots, slot) {
                    let subject = if spoof { "mallory_phone" } else { "sarah_phone" };
                    self.hub.screen(session, subject, vec![1; 8]).unwrap();
                }
            },
            Operation::Activity { slot, records } => {
                if let Some(session) = id(&self.slots, slot) {
                    let messages = vec!["m"; usize::from(records % 4)];
                    self.hub.activity(session, "john_phone", "calls", &messages).unwrap();
                }
            },
            Operation::SetHidden { slot, hidden } => {
                if let Some(session) = id(&self.slots, slot) {
                    self.hub.set_hidden(session, hidden).unwrap();
                }
            },
            Operation::Command { slot, target, live } => {
                if let Some(session) = id(&self.slots, slot) {
                    let target = target.map(|t| id(&self.slots, t).unwrap_or(u64::MAX));
                    let action = if live { "START_LIVE" } else { "PING" };
                    self.hub.command(session, target, action).unwrap();
                }
            },
            Operation::Disconnect { slot } => {
                if let Some(session) = self.slots.remove(&slot) {
                    self.hub.disconnect(session).unwrap();
                }
            },
            Operation::AdvanceTime { secs } => {
                self.hub.advance(Duration::from_secs(u64::from(secs))).unwrap();
            },
        }

        let hub = &self.hub;
        self.slots.retain(|_, session| hub.is_open(*session));
        self.invariants.assert_all(&self.hub.snapshot(), &format!("after {op:?}"));
    }
}

fn arbitrary_ops() -> impl Strategy<Value = Vec<Operation>> {
    let op = (any::<u8>(), any::<u8>(), any::<bool>(), any::<u16>(), 0..8usize, 0..8u8).prop_map(
        |(slot, other, flag, secs, identity, kind)| {
            let op = match kind {
                0 => Operation::Connect { slot },
                1 | 2 => Operation::Claim { slot, identity: Identity::ALL[identity] },
                3 => Operation::Screen { slot, spoof: flag },
                4 => Operation::Activity { slot, records: other },
                5 => Operation::SetHidden { slot, hidden: flag },
                6 => Operation::Command { slot, target: flag.then_some(other), live: flag },
                _ => {
                    if flag {
                        Operation::Disconnect { slot }
                    } else {
                        Operation::AdvanceTime { secs: secs % 600 }
                    }
                },
            };
            op.clamp_slots(5)
        },
    );

    prop::collection::vec(op, 0..100)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Invariants hold after every operation.
    #[test]
    fn prop_invariants_hold(seed in any::<u64>(), ops in arbitrary_ops()) {
        let mut checked = Checked::new(model_config(), seed, 0.0);
        for op in &ops {
            checked.apply(op);
        }
    }

    /// Losing best-effort frames never breaks routing or presence.
    #[test]
    fn prop_invariants_hold_under_loss(seed in any::<u64>(), ops in arbitrary_ops()) {
        let mut checked = Checked::new(model_config(), seed, 0.5);
        for op in &ops {
            checked.apply(op);
        }
    }

    /// Static grants are enforced as strictly as prefixes.
    #[test]
    fn prop_invariants_hold_with_static_grants(seed in any::<u64>(), ops in arbitrary_ops()) {
        let permissions = PermissionPolicy::Static(
            ["sarah=sarah_phone", "john=sarah_phone,john_phone"]
                .iter()
                .map(|grant| grant.parse::<Grant>().unwrap())
                .collect(),
        );
        let config = DriverConfig { permissions, ..model_config() };

        let mut checked = Checked::new(config, seed, 0.0);
        for op in &ops {
            checked.apply(op);
        }
    }
}

#[test]
fn wrong_key_never_raises_presence() {
    let mut hub = SimHub::new(model_config());
    let monitor = hub.join("sarah", None).unwrap();

    for attempt in ["", "model", "MODEL-KEY", "model-key "] {
        let id = hub.join("admin", Some(attempt)).unwrap();
        assert!(!hub.is_open(id), "key {attempt:?} should be rejected");
        assert!(!hub.driver().supervisor_present());
    }

    let admin = hub.join("admin", Some(MODEL_SUPERVISOR_KEY)).unwrap();
    assert!(hub.is_open(admin));
    assert!(hub.driver().supervisor_present());
    InvariantRegistry::standard().assert_all(&hub.snapshot(), "after valid claim");
    assert!(hub.is_open(monitor));
}
