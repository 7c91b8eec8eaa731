//! Recipient set computation.
//!
//! Turns a sender, a subject and an optional target into the snapshot of
//! session IDs that should receive a message. The snapshot is taken while
//! the driver holds exclusive access to the registry; delivery happens later
//! and may find some recipients gone.

use relayhub_core::{PermissionPolicy, Role};

use crate::registry::ConnectionRegistry;

/// Observers of relay data about `subject`.
///
/// Every supervisor, plus every visible monitor the policy permits.
pub fn relay_recipients(
    registry: &ConnectionRegistry,
    policy: &PermissionPolicy,
    subject: &str,
) -> Vec<u64> {
    let mut recipients: Vec<u64> = registry.supervisors().collect();

    recipients.extend(registry.sessions_with_role(Role::Monitor).filter(|id| {
        registry.session(*id).is_some_and(|info| {
            info.is_visible_monitor()
                && info.name.as_deref().is_some_and(|name| policy.permits(name, subject))
        })
    }));

    recipients
}

/// Nodes addressed by a supervisor command.
///
/// A target must be a live node; anything else yields an empty set. Without
/// a target every node is addressed. The sender is never included.
pub fn command_recipients(
    registry: &ConnectionRegistry,
    sender: Option<u64>,
    target: Option<u64>,
) -> Vec<u64> {
    match target {
        Some(id) if Some(id) == sender => Vec::new(),
        Some(id) if registry.role(id) == Some(Role::Node) => vec![id],
        Some(_) => Vec::new(),
        None => registry.sessions_with_role(Role::Node).filter(|id| Some(*id) != sender).collect(),
    }
}

/// Recipient set for a message from `sender`.
///
/// - Node: [`relay_recipients`] for `subject`
/// - Supervisor: [`command_recipients`] for `target`
/// - Monitor or unassigned: nobody
pub fn recipients_for(
    registry: &ConnectionRegistry,
    policy: &PermissionPolicy,
    sender: u64,
    subject: &str,
    target: Option<u64>,
) -> Vec<u64> {
    match registry.role(sender) {
        Some(Role::Node) => relay_recipients(registry, policy, subject),
        Some(Role::Supervisor) => command_recipients(registry, Some(sender), target),
        _ => Vec::new(),
    }
}
