//! Fuzz target for the hub routing pipeline
//!
//! Feeds arbitrary operation sequences (connects, claims, relays, commands,
//! disconnects, time) through the simulated hub and checks:
//! - the driver never errors on client input
//! - every standard invariant holds after each step
//! - the reference model agrees on recipients and observable state

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use relayhub_harness::{HubWorld, InvariantRegistry, ModelHub, Operation};

const SLOTS: u8 = 6;
const MAX_OPS: usize = 256;

#[derive(Debug, Arbitrary)]
struct PipelineInput {
    seed: u64,
    ops: Vec<Operation>,
}

fuzz_target!(|input: PipelineInput| {
    let invariants = InvariantRegistry::standard();
    let mut world = HubWorld::new(input.seed);
    let mut model = ModelHub::new();

    for op in input.ops.into_iter().take(MAX_OPS) {
        let op = op.clamp_slots(SLOTS);

        let Ok(real) = world.apply(&op) else {
            panic!("driver rejected {op:?}");
        };
        let expected = model.apply(&op);

        assert_eq!(real, expected, "recipients diverged on {op:?}");
        assert_eq!(world.observable_state(), model.observable_state(), "state diverged on {op:?}");

        invariants.assert_all(&world.hub().snapshot(), &format!("after {op:?}"));
    }
});
