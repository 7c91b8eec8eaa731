//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must hold after every event the hub
//! processes, whatever sequence led there. They run against a
//! [`HubSnapshot`] taken from a [`SimHub`](crate::SimHub), so a check sees
//! the registry and every inbox at one consistent point.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&hub.snapshot())?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    GroupTagConsistency, NoStrayDelivery, RelayScope, RoleIndexConsistency, SingleRoleAssignment,
    SupervisorPresenceAccuracy,
};
pub use snapshot::{HubSnapshot, SessionSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against hub state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &HubSnapshot) -> InvariantResult;

    /// Build a violation for this invariant.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Registry of invariants to check.
///
/// Use [`InvariantRegistry::standard()`] for the hub's routing invariants.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every standard hub invariant.
    ///
    /// Includes:
    /// - [`RoleIndexConsistency`]: role indexes match session roles
    /// - [`NoStrayDelivery`]: nothing is sent to a closed session
    /// - [`RelayScope`]: relay data only reaches permitted observers
    /// - [`SingleRoleAssignment`]: a session is assigned at most once
    /// - [`SupervisorPresenceAccuracy`]: everyone's last status is current
    /// - [`GroupTagConsistency`]: group tags follow from role and name
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(RoleIndexConsistency);
        registry.add(NoStrayDelivery);
        registry.add(RelayScope);
        registry.add(SingleRoleAssignment);
        registry.add(SupervisorPresenceAccuracy);
        registry.add(GroupTagConsistency);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &HubSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    ///
    /// Use this in tests where you want immediate failure with context.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &HubSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn empty_snapshot_passes_invariants() {
        let registry = InvariantRegistry::standard();
        assert!(registry.check_all(&HubSnapshot::default()).is_ok());
    }
}
