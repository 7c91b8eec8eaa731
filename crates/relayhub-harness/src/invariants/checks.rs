//! Standard invariant checks.
//!
//! These capture routing and lifecycle properties that must hold after any
//! sequence of connects, claims, relays and disconnects.

use relayhub_core::Role;
use relayhub_proto::{Payload, payloads::session::RoleKind};

use super::{HubSnapshot, Invariant, InvariantResult};

/// Role indexes and per-session roles agree.
///
/// Every open session is registered, every closed one is not, and each
/// assigned session appears in exactly the index of its own role.
pub struct RoleIndexConsistency;

impl Invariant for RoleIndexConsistency {
    fn name(&self) -> &'static str {
        "role_index_consistency"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        for session in &state.sessions {
            match (session.open, session.registered_role) {
                (true, None) => {
                    return Err(
                        self.violation(format!("open session {} is not registered", session.id))
                    );
                },
                (false, Some(role)) => {
                    return Err(self.violation(format!(
                        "closed session {} still registered as {role:?}",
                        session.id
                    )));
                },
                _ => {},
            }

            for (role, ids) in &state.role_index {
                let indexed = ids.contains(&session.id);
                let holds = session.registered_role == Some(*role);
                if indexed != holds {
                    return Err(self.violation(format!(
                        "session {} registered as {:?} but {} the {role:?} index",
                        session.id,
                        session.registered_role,
                        if indexed { "is in" } else { "is missing from" }
                    )));
                }
            }
        }

        for (role, ids) in &state.role_index {
            if let Some(id) = ids.iter().find(|id| !state.sessions.iter().any(|s| s.id == **id)) {
                return Err(self.violation(format!("{role:?} index holds unknown session {id}")));
            }
        }

        Ok(())
    }
}

/// No frame is ever addressed to a closed session.
pub struct NoStrayDelivery;

impl Invariant for NoStrayDelivery {
    fn name(&self) -> &'static str {
        "no_stray_delivery"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        if state.stray_deliveries == 0 {
            Ok(())
        } else {
            Err(self.violation(format!(
                "{} frame(s) addressed to closed sessions",
                state.stray_deliveries
            )))
        }
    }
}

/// Each payload reaches only the roles allowed to see it.
///
/// - screen frames and samples: supervisors, and monitors permitted to
///   observe the subject
/// - activity logs and node presence: supervisors
/// - commands: nodes
///
/// Nothing role-scoped arrives before the session's role assignment.
pub struct RelayScope;

impl Invariant for RelayScope {
    fn name(&self) -> &'static str {
        "relay_scope"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        for session in &state.sessions {
            let mut assigned: Option<(RoleKind, &str)> = None;

            for payload in &session.received {
                let allowed = match payload {
                    Payload::RoleAssigned(a) => {
                        assigned = Some((a.role, a.name.as_str()));
                        continue;
                    },
                    Payload::ScreenFrame(frame) => observes(state, assigned, &frame.subject),
                    Payload::Sample(sample) => observes(state, assigned, &sample.subject),
                    Payload::ActivityLog(_) | Payload::NodePresence(_) => {
                        matches!(assigned, Some((RoleKind::Supervisor, _)))
                    },
                    Payload::Command(_) => matches!(assigned, Some((RoleKind::Node, _))),
                    _ => continue,
                };

                if !allowed {
                    return Err(self.violation(format!(
                        "session {} ({:?}) received {:?}",
                        session.id,
                        assigned.map(|(role, _)| role),
                        payload.opcode()
                    )));
                }
            }
        }

        Ok(())
    }
}

fn observes(state: &HubSnapshot, assigned: Option<(RoleKind, &str)>, subject: &str) -> bool {
    match assigned {
        Some((RoleKind::Supervisor, _)) => true,
        Some((RoleKind::Monitor, name)) => state.permissions.permits(name, subject),
        _ => false,
    }
}

/// A session is assigned a role at most once.
pub struct SingleRoleAssignment;

impl Invariant for SingleRoleAssignment {
    fn name(&self) -> &'static str {
        "single_role_assignment"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        match state.sessions.iter().find(|s| s.assignments().count() > 1) {
            Some(session) => Err(self.violation(format!(
                "session {} was assigned {} times",
                session.id,
                session.assignments().count()
            ))),
            None => Ok(()),
        }
    }
}

/// Every open session's latest status matches supervisor presence.
pub struct SupervisorPresenceAccuracy;

impl Invariant for SupervisorPresenceAccuracy {
    fn name(&self) -> &'static str {
        "supervisor_presence_accuracy"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        let indexed = state
            .role_index
            .iter()
            .any(|(role, ids)| *role == Role::Supervisor && !ids.is_empty());
        if indexed != state.supervisor_present {
            return Err(self.violation(format!(
                "driver reports admin_present={} with supervisor index non-empty={indexed}",
                state.supervisor_present
            )));
        }

        for session in state.open_sessions() {
            let last = session.last_status().map(|status| status.admin_present);
            if last != Some(state.supervisor_present) {
                return Err(self.violation(format!(
                    "session {} last saw admin_present={last:?}, actual {}",
                    session.id, state.supervisor_present
                )));
            }
        }

        Ok(())
    }
}

/// Group tags follow from role and name.
///
/// Supervisors carry no tag, a monitor's tag is its own name, and a node's
/// tag is its name up to the first `_`.
pub struct GroupTagConsistency;

impl Invariant for GroupTagConsistency {
    fn name(&self) -> &'static str {
        "group_tag_consistency"
    }

    fn check(&self, state: &HubSnapshot) -> InvariantResult {
        for session in state.open_sessions() {
            let name = session.name.as_deref();
            let group = session.group.as_deref();

            let consistent = match session.registered_role {
                None | Some(Role::Unassigned) => name.is_none() && group.is_none(),
                Some(Role::Supervisor) => name.is_some() && group.is_none(),
                Some(Role::Monitor) => name.is_some() && group == name,
                Some(Role::Node) => name.is_some_and(|name| group == Some(owner_of(name))),
            };

            if !consistent {
                return Err(self.violation(format!(
                    "session {} ({:?}) named {name:?} carries group {group:?}",
                    session.id, session.registered_role
                )));
            }
        }

        Ok(())
    }
}

fn owner_of(name: &str) -> &str {
    name.split_once('_').map_or(name, |(owner, _)| owner)
}

#[cfg(test)]
mod tests {
    use relayhub_proto::payloads::{
        relay::ScreenFrame,
        session::{RoleAssigned, StatusUpdate},
    };

    use super::*;
    use crate::SessionSnapshot;

    fn session(id: u64, role: Option<Role>, received: Vec<Payload>) -> SessionSnapshot {
        SessionSnapshot {
            id,
            open: role.is_some(),
            registered_role: role,
            name: None,
            group: None,
            received,
        }
    }

    fn tagged(role: Role, name: &str, group: Option<&str>) -> HubSnapshot {
        HubSnapshot {
            sessions: vec![SessionSnapshot {
                name: Some(name.to_string()),
                group: group.map(str::to_string),
                ..session(1, Some(role), vec![])
            }],
            ..HubSnapshot::default()
        }
    }

    fn assigned(role: RoleKind, name: &str) -> Payload {
        Payload::RoleAssigned(RoleAssigned { role, name: name.to_string() })
    }

    fn screen(subject: &str) -> Payload {
        Payload::ScreenFrame(ScreenFrame { subject: subject.to_string(), data: vec![] })
    }

    #[test]
    fn monitor_outside_its_prefix_is_a_violation() {
        let state = HubSnapshot {
            sessions: vec![session(1, Some(Role::Monitor), vec![
                assigned(RoleKind::Monitor, "john"),
                screen("sarah_phone1"),
            ])],
            ..HubSnapshot::default()
        };

        assert!(RelayScope.check(&state).is_err());
    }

    #[test]
    fn monitor_inside_its_prefix_is_fine() {
        let state = HubSnapshot {
            sessions: vec![session(1, Some(Role::Monitor), vec![
                assigned(RoleKind::Monitor, "sarah"),
                screen("sarah_phone1"),
            ])],
            ..HubSnapshot::default()
        };

        assert!(RelayScope.check(&state).is_ok());
    }

    #[test]
    fn relay_before_assignment_is_a_violation() {
        let state = HubSnapshot {
            sessions: vec![session(1, Some(Role::Supervisor), vec![
                screen("sarah_phone1"),
                assigned(RoleKind::Supervisor, "admin"),
            ])],
            ..HubSnapshot::default()
        };

        assert!(RelayScope.check(&state).is_err());
    }

    #[test]
    fn missing_index_entry_is_a_violation() {
        let state = HubSnapshot {
            sessions: vec![session(1, Some(Role::Node), vec![])],
            role_index: vec![(Role::Node, vec![])],
            ..HubSnapshot::default()
        };

        assert!(RoleIndexConsistency.check(&state).is_err());
    }

    #[test]
    fn stale_status_is_a_violation() {
        let state = HubSnapshot {
            sessions: vec![session(1, Some(Role::Monitor), vec![Payload::StatusUpdate(
                StatusUpdate { admin_present: false },
            )])],
            role_index: vec![(Role::Supervisor, vec![2])],
            supervisor_present: true,
            ..HubSnapshot::default()
        };

        assert!(SupervisorPresenceAccuracy.check(&state).is_err());
    }

    #[test]
    fn node_group_is_its_owner_prefix() {
        let check = |name, group| GroupTagConsistency.check(&tagged(Role::Node, name, group));

        assert!(check("sarah_phone1", Some("sarah")).is_ok());
        assert!(check("tablet", Some("tablet")).is_ok());
        assert!(check("sarah_phone1", Some("john")).is_err());
        assert!(check("sarah_phone1", None).is_err());
    }

    #[test]
    fn monitor_and_supervisor_tags() {
        assert!(GroupTagConsistency.check(&tagged(Role::Monitor, "sarah", Some("sarah"))).is_ok());
        assert!(GroupTagConsistency.check(&tagged(Role::Monitor, "sarah", None)).is_err());
        assert!(GroupTagConsistency.check(&tagged(Role::Supervisor, "admin", None)).is_ok());
        assert!(
            GroupTagConsistency.check(&tagged(Role::Supervisor, "admin", Some("admin"))).is_err()
        );
    }

    #[test]
    fn unassigned_session_has_no_tag() {
        let state = HubSnapshot {
            sessions: vec![session(1, Some(Role::Unassigned), vec![])],
            ..HubSnapshot::default()
        };
        assert!(GroupTagConsistency.check(&state).is_ok());
    }
}
