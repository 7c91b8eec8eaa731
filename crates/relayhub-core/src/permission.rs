//! Which monitors may observe which nodes.
//!
//! Exactly one [`PermissionPolicy`] is active per server. Supervisors see
//! every node regardless of policy; this module only answers the monitor
//! question.

use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use thiserror::Error;

use crate::role::{GROUP_SEPARATOR, normalize_name};

/// Monitor visibility rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PermissionPolicy {
    /// Monitor `m` sees node `s` iff `s` starts with `m_`.
    #[default]
    Prefix,
    /// Monitor `m` sees exactly the nodes listed for it.
    Static(StaticPermissions),
}

impl PermissionPolicy {
    /// Whether `monitor` may receive relay data about `subject`.
    ///
    /// Both names are normalized before comparison.
    pub fn permits(&self, monitor: &str, subject: &str) -> bool {
        let monitor = normalize_name(monitor);
        let subject = normalize_name(subject);

        match self {
            Self::Prefix => prefix_matches(&monitor, &subject),
            Self::Static(table) => table.allows(&monitor, &subject),
        }
    }
}

/// `subject` begins with `{monitor}_`.
///
/// Expects normalized input. An empty monitor name matches nothing.
pub fn prefix_matches(monitor: &str, subject: &str) -> bool {
    if monitor.is_empty() {
        return false;
    }

    subject
        .strip_prefix(monitor)
        .is_some_and(|rest| rest.starts_with(GROUP_SEPARATOR))
}

/// Static monitor-to-nodes table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPermissions {
    table: HashMap<String, HashSet<String>>,
}

impl StaticPermissions {
    /// Empty table. Denies everything until grants are added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `monitor` to observe each of `nodes`.
    pub fn grant<I, S>(&mut self, monitor: &str, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entry = self.table.entry(normalize_name(monitor)).or_default();
        entry.extend(nodes.into_iter().map(|n| normalize_name(n.as_ref())));
    }

    /// Expects normalized input.
    fn allows(&self, monitor: &str, subject: &str) -> bool {
        self.table.get(monitor).is_some_and(|nodes| nodes.contains(subject))
    }

    /// Number of monitors with at least one grant entry.
    pub fn monitor_count(&self) -> usize {
        self.table.len()
    }
}

impl FromIterator<Grant> for StaticPermissions {
    fn from_iter<T: IntoIterator<Item = Grant>>(iter: T) -> Self {
        let mut permissions = Self::new();
        for grant in iter {
            permissions.grant(&grant.monitor, &grant.nodes);
        }
        permissions
    }
}

/// One `monitor=node1,node2` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Normalized monitor name
    pub monitor: String,
    /// Normalized node names
    pub nodes: Vec<String>,
}

/// Malformed grant string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantParseError {
    /// No `=` between monitor and node list
    #[error("grant '{0}' is missing '='")]
    MissingSeparator(String),

    /// Empty monitor name
    #[error("grant '{0}' has an empty monitor name")]
    EmptyMonitor(String),

    /// Empty node list
    #[error("grant '{0}' lists no nodes")]
    NoNodes(String),
}

impl FromStr for Grant {
    type Err = GrantParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (monitor, nodes) =
            s.split_once('=').ok_or_else(|| GrantParseError::MissingSeparator(s.to_string()))?;

        let monitor = normalize_name(monitor);
        if monitor.is_empty() {
            return Err(GrantParseError::EmptyMonitor(s.to_string()));
        }

        let nodes: Vec<String> =
            nodes.split(',').map(normalize_name).filter(|n| !n.is_empty()).collect();
        if nodes.is_empty() {
            return Err(GrantParseError::NoNodes(s.to_string()));
        }

        Ok(Self { monitor, nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_policy_matches_owner() {
        let policy = PermissionPolicy::Prefix;
        assert!(policy.permits("sarah", "sarah_phone1"));
        assert!(policy.permits("Sarah", "SARAH_tablet"));
        assert!(!policy.permits("john", "sarah_phone1"));
    }

    #[test]
    fn prefix_requires_separator_boundary() {
        assert!(!prefix_matches("sara", "sarah_phone1"));
        assert!(!prefix_matches("sarah", "sarah"));
        assert!(!prefix_matches("", "_phone"));
        assert!(prefix_matches("sarah", "sarah_"));
    }

    #[test]
    fn static_policy_uses_table_only() {
        let mut table = StaticPermissions::new();
        table.grant("guard", ["sarah_phone1", "john_laptop"]);
        let policy = PermissionPolicy::Static(table);

        assert!(policy.permits("guard", "sarah_phone1"));
        assert!(policy.permits("GUARD", "John_Laptop"));
        assert!(!policy.permits("guard", "sarah_phone2"));
        // Prefix rule is not consulted under a static table.
        assert!(!policy.permits("sarah", "sarah_phone1"));
    }

    #[test]
    fn grants_accumulate() {
        let table: StaticPermissions =
            ["guard=a_1".parse::<Grant>().unwrap(), "guard=b_1".parse().unwrap()]
                .into_iter()
                .collect();

        assert_eq!(table.monitor_count(), 1);
        let policy = PermissionPolicy::Static(table);
        assert!(policy.permits("guard", "a_1"));
        assert!(policy.permits("guard", "b_1"));
    }

    #[test]
    fn parse_grant() {
        let grant: Grant = " Guard = sarah_phone1, JOHN_laptop ,".parse().unwrap();
        assert_eq!(grant.monitor, "guard");
        assert_eq!(grant.nodes, vec!["sarah_phone1", "john_laptop"]);
    }

    #[test]
    fn parse_grant_errors() {
        assert!(matches!("guard".parse::<Grant>(), Err(GrantParseError::MissingSeparator(_))));
        assert!(matches!(" =a_1".parse::<Grant>(), Err(GrantParseError::EmptyMonitor(_))));
        assert!(matches!("guard=, ,".parse::<Grant>(), Err(GrantParseError::NoNodes(_))));
    }
}
