//! Integration tests for permission-scoped relay routing.
//!
//! Runs the driver inside the simulation harness so every delivery lands in
//! an inbox that can be inspected afterwards.

use relayhub_core::{ClassifierConfig, Grant, PermissionPolicy, StaticPermissions};
use relayhub_harness::SimHub;
use relayhub_proto::{
    FrameFlags, Opcode, Payload,
    payloads::{
        ErrorPayload,
        relay::{ScreenFrame, Sample},
    },
};
use relayhub_server::{Delivery, DriverConfig, LogLevel};

const KEY: &str = "s3cret";

fn config() -> DriverConfig {
    DriverConfig {
        classifier: ClassifierConfig::default().with_supervisor_key(KEY),
        ..DriverConfig::default()
    }
}

/// Screen frames received by a session, by subject.
fn screen_subjects(hub: &SimHub, session_id: u64) -> Vec<String> {
    hub.received(session_id)
        .into_iter()
        .filter_map(|p| match p {
            Payload::ScreenFrame(ScreenFrame { subject, .. }) => Some(subject),
            _ => None,
        })
        .collect()
}

#[test]
fn monitors_see_only_their_own_nodes() {
    let mut hub = SimHub::new(config());
    let admin = hub.join("admin", Some(KEY)).unwrap();
    let sarah = hub.join("sarah", None).unwrap();
    let john = hub.join("john", None).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();

    hub.screen(phone, "sarah_phone1", vec![0xFF; 64]).unwrap();

    assert_eq!(screen_subjects(&hub, sarah), vec!["sarah_phone1"]);
    assert_eq!(screen_subjects(&hub, admin), vec!["sarah_phone1"]);
    assert!(screen_subjects(&hub, john).is_empty());
    assert!(screen_subjects(&hub, phone).is_empty());
}

#[test]
fn prefix_requires_separator_boundary() {
    let mut hub = SimHub::new(config());
    let sarah = hub.join("sarah", None).unwrap();
    let tablet = hub.join("sarahson_tablet", None).unwrap();

    hub.screen(tablet, "sarahson_tablet", vec![1]).unwrap();

    assert!(screen_subjects(&hub, sarah).is_empty());
}

#[test]
fn claimed_names_are_normalized() {
    let mut hub = SimHub::new(config());
    let sarah = hub.join("  Sarah ", None).unwrap();
    let phone = hub.join("SARAH_Phone1", None).unwrap();

    hub.screen(phone, "sarah_PHONE1", vec![2]).unwrap();

    assert_eq!(screen_subjects(&hub, sarah), vec!["sarah_PHONE1"]);
}

#[test]
fn hidden_monitor_stops_and_resumes_receiving() {
    let mut hub = SimHub::new(config());
    let sarah = hub.join("sarah", None).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();

    hub.set_hidden(sarah, true).unwrap();
    hub.screen(phone, "sarah_phone1", vec![1]).unwrap();
    assert!(screen_subjects(&hub, sarah).is_empty());

    hub.set_hidden(sarah, false).unwrap();
    hub.screen(phone, "sarah_phone1", vec![2]).unwrap();
    assert_eq!(screen_subjects(&hub, sarah).len(), 1);
}

#[test]
fn hidden_flag_is_ignored_for_non_monitors() {
    let mut hub = SimHub::new(config());
    let admin = hub.join("admin", Some(KEY)).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();

    hub.set_hidden(admin, true).unwrap();
    hub.screen(phone, "sarah_phone1", vec![1]).unwrap();

    assert_eq!(screen_subjects(&hub, admin).len(), 1);
}

#[test]
fn screen_frames_are_volatile_samples_are_reliable() {
    let mut hub = SimHub::new(config());
    let admin = hub.join("admin", Some(KEY)).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();
    hub.clear_received(admin);

    hub.screen(phone, "sarah_phone1", vec![7; 32]).unwrap();
    hub.sample(phone, "sarah_phone1", "location", ciborium::Value::Array(vec![
        ciborium::Value::Float(52.52),
        ciborium::Value::Float(13.40),
    ]))
    .unwrap();

    let inbox = hub.inbox(admin).unwrap();
    let [screen, sample] = inbox.frames() else {
        panic!("expected two frames, got {}", inbox.frames().len());
    };

    assert_eq!(screen.delivery, Delivery::BestEffort);
    assert!(screen.frame.header.flags().contains(FrameFlags::VOLATILE));
    assert_eq!(screen.frame.header.session_id(), phone);

    assert_eq!(sample.delivery, Delivery::Reliable);
    assert_eq!(sample.frame.header.opcode_enum(), Some(Opcode::Sample));
    assert!(matches!(Payload::from_frame(&sample.frame).unwrap(),
        Payload::Sample(Sample { kind, .. }) if kind == "location"));
}

#[test]
fn relay_bytes_are_forwarded_verbatim() {
    let mut hub = SimHub::new(config());
    let admin = hub.join("admin", Some(KEY)).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();
    hub.clear_received(admin);

    let frame = Payload::ScreenFrame(ScreenFrame {
        subject: "sarah_phone1".to_string(),
        data: (0..=255).collect(),
    })
    .into_frame()
    .unwrap();
    let original = frame.payload.clone();

    hub.send_frame(phone, frame).unwrap();

    let delivered = &hub.inbox(admin).unwrap().frames()[0];
    assert_eq!(delivered.frame.payload, original);
}

#[test]
fn spoofed_subject_reaches_nobody() {
    let mut hub = SimHub::new(config());
    let admin = hub.join("admin", Some(KEY)).unwrap();
    let john = hub.join("john", None).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();

    hub.screen(phone, "john_laptop", vec![1]).unwrap();

    assert!(screen_subjects(&hub, admin).is_empty());
    assert!(screen_subjects(&hub, john).is_empty());
    assert!(hub.logs_at(LogLevel::Warn).any(|m| m.contains("john_laptop")));
}

#[test]
fn static_grants_replace_prefix_matching() {
    let grants: StaticPermissions =
        ["nanny=sarah_phone1"].iter().map(|g| g.parse::<Grant>().unwrap()).collect();
    let mut hub = SimHub::new(DriverConfig {
        permissions: PermissionPolicy::Static(grants),
        ..config()
    });

    let nanny = hub.join("nanny", None).unwrap();
    let sarah = hub.join("sarah", None).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();

    hub.screen(phone, "sarah_phone1", vec![1]).unwrap();

    assert_eq!(screen_subjects(&hub, nanny).len(), 1);
    assert!(screen_subjects(&hub, sarah).is_empty());
}

#[test]
fn monitors_and_nodes_cannot_send_each_others_frames() {
    let mut hub = SimHub::new(config());
    let admin = hub.join("admin", Some(KEY)).unwrap();
    let sarah = hub.join("sarah", None).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();
    hub.clear_received(admin);
    hub.clear_received(phone);

    // A monitor pretending to be a node, a node pretending to be a supervisor.
    hub.screen(sarah, "sarah_phone1", vec![1]).unwrap();
    hub.command(phone, None, "START_LIVE").unwrap();

    assert!(hub.received(admin).is_empty());
    assert!(hub.received(phone).is_empty());
    assert_eq!(hub.driver().pending_delayed_commands(), 0);
}

#[test]
fn undecodable_payload_gets_an_error_response() {
    let mut hub = SimHub::new(config());
    let phone = hub.join("sarah_phone1", None).unwrap();
    hub.clear_received(phone);

    let mut frame = Payload::ActivityBatch(relayhub_proto::payloads::relay::ActivityBatch {
        subject: "sarah_phone1".to_string(),
        kind: "sms".to_string(),
        records: vec![],
    })
    .into_frame()
    .unwrap();
    frame.payload = bytes::Bytes::from_static(&[0xFF, 0x00, 0x13]);
    frame.header.set_payload_size(3);

    hub.send_frame(phone, frame).unwrap();

    assert!(matches!(hub.received(phone).as_slice(),
        [Payload::Error(ErrorPayload { code: ErrorPayload::INVALID_PAYLOAD, .. })]));
    assert!(hub.is_open(phone));
}

#[test]
fn sample_without_body_is_rejected_not_relayed() {
    let mut hub = SimHub::new(config());
    let admin = hub.join("admin", Some(KEY)).unwrap();
    let sarah = hub.join("sarah", None).unwrap();
    let phone = hub.join("sarah_phone1", None).unwrap();
    hub.clear_received(admin);
    hub.clear_received(sarah);
    hub.clear_received(phone);

    let subject_only = ciborium::Value::Map(vec![(
        ciborium::Value::Text("subject".to_string()),
        ciborium::Value::Text("sarah_phone1".to_string()),
    )]);
    let mut body = Vec::new();
    ciborium::into_writer(&subject_only, &mut body).unwrap();

    let mut frame = Payload::Sample(Sample {
        subject: "sarah_phone1".to_string(),
        kind: "location".to_string(),
        data: ciborium::Value::Null,
    })
    .into_frame()
    .unwrap();
    frame.header.set_payload_size(body.len() as u32);
    frame.payload = bytes::Bytes::from(body);

    hub.send_frame(phone, frame).unwrap();

    assert!(matches!(hub.received(phone).as_slice(),
        [Payload::Error(ErrorPayload { code: ErrorPayload::INVALID_PAYLOAD, .. })]));
    assert!(hub.received(admin).is_empty());
    assert!(hub.received(sarah).is_empty());
    assert!(hub.is_open(phone));
}
