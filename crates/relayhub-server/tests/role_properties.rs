//! Property-based tests for role assignment.
//!
//! Whatever a client claims and in whatever order, the first accepted claim
//! decides its role for the rest of the connection, and only the right key
//! ever makes a supervisor.

use proptest::prelude::*;
use relayhub_core::{ClassifierConfig, Role};
use relayhub_harness::SimHub;
use relayhub_server::DriverConfig;

const KEY: &str = "correct horse";

fn hub() -> SimHub {
    SimHub::new(DriverConfig {
        classifier: ClassifierConfig::default().with_supervisor_key(KEY),
        ..DriverConfig::default()
    })
}

/// Claimed names: plain, grouped, reserved, and odd spacing or case.
fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}",
        "[a-z]{1,6}_[a-z0-9]{1,6}",
        Just("admin".to_string()),
        Just(" Admin ".to_string()),
        "[ ]{0,2}[A-Za-z_]{1,10}[ ]{0,2}",
    ]
}

fn key_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), Just(Some(KEY.to_string())), "[a-z ]{0,16}".prop_map(Some)]
}

fn expected_role(name: &str, key: Option<&str>) -> Option<Role> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        None
    } else if name == "admin" {
        (key == Some(KEY)).then_some(Role::Supervisor)
    } else if name.contains('_') {
        Some(Role::Node)
    } else {
        Some(Role::Monitor)
    }
}

proptest! {
    /// The first accepted claim fixes the role; later claims change nothing.
    #[test]
    fn prop_role_fixed_by_first_accepted_claim(
        claims in prop::collection::vec((name_strategy(), key_strategy()), 1..8)
    ) {
        let mut hub = hub();
        let id = hub.connect().unwrap();
        let mut settled: Option<Role> = None;

        for (name, key) in &claims {
            if !hub.is_open(id) {
                break;
            }
            hub.claim(id, name, key.as_deref()).unwrap();

            match (settled, expected_role(name, key.as_deref())) {
                (Some(role), _) => prop_assert_eq!(hub.driver().role(id), Some(role)),
                (None, Some(role)) => {
                    settled = Some(role);
                    prop_assert_eq!(hub.driver().role(id), Some(role));
                },
                // Empty names are ignored; a failed supervisor claim terminates.
                (None, None) if name.trim().is_empty() => {
                    prop_assert_eq!(hub.driver().role(id), Some(Role::Unassigned));
                },
                (None, None) => prop_assert!(!hub.is_open(id)),
            }
        }
    }

    /// A wrong or missing key never raises supervisor presence.
    #[test]
    fn prop_wrong_key_never_changes_presence(
        keys in prop::collection::vec(prop::option::of("[ -~]{0,20}"), 1..10)
    ) {
        let mut hub = hub();
        let monitor = hub.join("sarah", None).unwrap();

        for key in keys.iter().filter(|k| k.as_deref() != Some(KEY)) {
            let id = hub.join("admin", key.as_deref()).unwrap();
            prop_assert!(!hub.is_open(id));
            prop_assert!(!hub.driver().supervisor_present());
        }

        prop_assert_eq!(hub.driver().connection_count(), 1);
        prop_assert!(hub.is_open(monitor));
    }
}
