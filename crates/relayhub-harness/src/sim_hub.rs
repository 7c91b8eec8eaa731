//! Simulated hub runtime.
//!
//! `SimHub` plays the part of the production server around a
//! [`ServerDriver`]: it allocates session IDs, feeds events in and executes
//! the returned actions against in-memory inboxes instead of QUIC streams.
//! Everything is synchronous and deterministic.
//!
//! Close semantics follow the production runtime: a `CloseConnection`
//! action closes the inbox after everything queued before it, then reports
//! `ConnectionClosed` back to the driver.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use relayhub_core::Role;
use relayhub_proto::{
    Frame, Payload,
    payloads::{
        command::Command,
        relay::{ActivityBatch, ActivityRecord, Sample, ScreenFrame},
        session::{ClaimRole, SetVisibility},
    },
};
use relayhub_server::{
    Delivery, DriverConfig, DriverError, LogLevel, ServerAction, ServerDriver, ServerEvent,
};

use crate::{
    invariants::{HubSnapshot, SessionSnapshot},
    sim_env::{SimEnv, SimInstant},
};

/// Frame delivered to a simulated session.
#[derive(Debug, Clone)]
pub struct Delivered {
    /// Frame as the runtime would have written it
    pub frame: Frame,
    /// Guarantee the driver asked for
    pub delivery: Delivery,
}

/// Everything one session has been sent.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    frames: Vec<Delivered>,
    close_reason: Option<String>,
}

impl Inbox {
    /// Frames received so far, oldest first.
    pub fn frames(&self) -> &[Delivered] {
        &self.frames
    }

    /// Still connected.
    pub fn is_open(&self) -> bool {
        self.close_reason.is_none()
    }

    /// Why the session was closed.
    pub fn close_reason(&self) -> Option<&str> {
        self.close_reason.as_deref()
    }
}

/// Deterministic hub simulation.
pub struct SimHub {
    driver: ServerDriver<SimEnv>,
    env: SimEnv,
    /// Session ID → inbox, kept after close for inspection
    inboxes: BTreeMap<u64, Inbox>,
    next_session_id: u64,
    /// Probability that a best-effort frame is lost
    best_effort_loss: f64,
    loss_rng: ChaCha8Rng,
    /// Frames addressed to a session that was closed or never existed
    stray_deliveries: usize,
    logs: Vec<(LogLevel, String)>,
}

impl SimHub {
    /// Hub with the default seed.
    pub fn new(config: DriverConfig) -> Self {
        Self::with_seed(config, 0)
    }

    /// Hub with a specific seed for the environment and loss model.
    pub fn with_seed(config: DriverConfig, seed: u64) -> Self {
        let env = SimEnv::with_seed(seed);
        Self {
            driver: ServerDriver::new(env.clone(), config),
            env,
            inboxes: BTreeMap::new(),
            next_session_id: 1,
            best_effort_loss: 0.0,
            loss_rng: ChaCha8Rng::seed_from_u64(seed ^ 0xD209),
            stray_deliveries: 0,
            logs: Vec::new(),
        }
    }

    /// Lose best-effort frames with the given probability.
    pub fn set_best_effort_loss(&mut self, probability: f64) {
        self.best_effort_loss = probability.clamp(0.0, 1.0);
    }

    /// Open a connection and return its session ID.
    pub fn connect(&mut self) -> Result<u64, DriverError> {
        let session_id = self.next_session_id;
        self.next_session_id += 1;
        self.inboxes.insert(session_id, Inbox::default());

        self.process(ServerEvent::ConnectionAccepted { session_id })?;
        Ok(session_id)
    }

    /// Connect and claim a name in one step.
    pub fn join(&mut self, name: &str, key: Option<&str>) -> Result<u64, DriverError> {
        let session_id = self.connect()?;
        self.claim(session_id, name, key)?;
        Ok(session_id)
    }

    /// Send a role claim.
    pub fn claim(
        &mut self,
        session_id: u64,
        name: &str,
        key: Option<&str>,
    ) -> Result<(), DriverError> {
        self.send(session_id, Payload::ClaimRole(ClaimRole {
            name: name.to_string(),
            key: key.map(str::to_string),
            net_type: None,
        }))
    }

    /// Send a node claim that reports its network type.
    pub fn claim_node(
        &mut self,
        session_id: u64,
        name: &str,
        net_type: &str,
    ) -> Result<(), DriverError> {
        self.send(session_id, Payload::ClaimRole(ClaimRole {
            name: name.to_string(),
            key: None,
            net_type: Some(net_type.to_string()),
        }))
    }

    /// Hide or unhide a monitor.
    pub fn set_hidden(&mut self, session_id: u64, hidden: bool) -> Result<(), DriverError> {
        self.send(session_id, Payload::SetVisibility(SetVisibility { hidden }))
    }

    /// Send a screen frame about `subject`.
    pub fn screen(
        &mut self,
        session_id: u64,
        subject: &str,
        data: Vec<u8>,
    ) -> Result<(), DriverError> {
        self.send(session_id, Payload::ScreenFrame(ScreenFrame {
            subject: subject.to_string(),
            data,
        }))
    }

    /// Send a sample about `subject`.
    pub fn sample(
        &mut self,
        session_id: u64,
        subject: &str,
        kind: &str,
        data: ciborium::Value,
    ) -> Result<(), DriverError> {
        self.send(session_id, Payload::Sample(Sample {
            subject: subject.to_string(),
            kind: kind.to_string(),
            data,
        }))
    }

    /// Send an activity batch with one record per message.
    pub fn activity(
        &mut self,
        session_id: u64,
        subject: &str,
        kind: &str,
        messages: &[&str],
    ) -> Result<(), DriverError> {
        self.send(session_id, Payload::ActivityBatch(ActivityBatch {
            subject: subject.to_string(),
            kind: kind.to_string(),
            records: messages
                .iter()
                .map(|message| ActivityRecord { message: (*message).to_string() })
                .collect(),
        }))
    }

    /// Send a supervisor command.
    pub fn command(
        &mut self,
        session_id: u64,
        target: Option<u64>,
        action: &str,
    ) -> Result<(), DriverError> {
        self.send(session_id, Payload::Command(Command { target, action: action.to_string() }))
    }

    /// Encode and send a payload from `session_id`.
    pub fn send(&mut self, session_id: u64, payload: Payload) -> Result<(), DriverError> {
        let frame = payload.into_frame()?;
        self.send_frame(session_id, frame)
    }

    /// Send a raw frame from `session_id`.
    pub fn send_frame(&mut self, session_id: u64, frame: Frame) -> Result<(), DriverError> {
        self.process(ServerEvent::FrameReceived { session_id, frame })
    }

    /// Peer-initiated disconnect. Closing an already closed session only
    /// notifies the driver again.
    pub fn disconnect(&mut self, session_id: u64) -> Result<(), DriverError> {
        if let Some(inbox) = self.inboxes.get_mut(&session_id) {
            inbox.close_reason.get_or_insert_with(|| "peer disconnected".to_string());
        }
        self.process(ServerEvent::ConnectionClosed {
            session_id,
            reason: "peer disconnected".to_string(),
        })
    }

    /// Deliver a tick to the driver.
    pub fn tick(&mut self) -> Result<(), DriverError> {
        self.process(ServerEvent::Tick)
    }

    /// Move the clock forward, then tick.
    pub fn advance(&mut self, duration: Duration) -> Result<(), DriverError> {
        self.env.advance(duration);
        self.tick()
    }

    /// Feed one event to the driver and execute what it returns.
    pub fn process(&mut self, event: ServerEvent) -> Result<(), DriverError> {
        let mut events = VecDeque::from([event]);

        while let Some(event) = events.pop_front() {
            let actions = self.driver.process_event(event)?;
            events.extend(self.execute(actions));
        }

        Ok(())
    }

    /// Execute actions, returning close notifications for the driver.
    fn execute(&mut self, actions: Vec<ServerAction<SimInstant>>) -> Vec<ServerEvent> {
        let mut closed = Vec::new();

        for action in actions {
            match action {
                ServerAction::SendToSession { session_id, frame, delivery } => {
                    self.deliver(session_id, &frame, delivery);
                },
                ServerAction::Broadcast { recipients, frame, delivery } => {
                    for session_id in recipients {
                        self.deliver(session_id, &frame, delivery);
                    }
                },
                ServerAction::CloseConnection { session_id, reason } => {
                    if let Some(inbox) = self.inboxes.get_mut(&session_id) {
                        if inbox.close_reason.is_none() {
                            inbox.close_reason = Some(reason.clone());
                            closed.push(ServerEvent::ConnectionClosed { session_id, reason });
                        }
                    }
                },
                ServerAction::Log { level, message, .. } => {
                    tracing::trace!(?level, "{message}");
                    self.logs.push((level, message));
                },
            }
        }

        closed
    }

    fn deliver(&mut self, session_id: u64, frame: &Frame, delivery: Delivery) {
        let Some(inbox) = self.inboxes.get_mut(&session_id).filter(|inbox| inbox.is_open())
        else {
            self.stray_deliveries += 1;
            return;
        };

        if delivery == Delivery::BestEffort
            && self.best_effort_loss > 0.0
            && self.loss_rng.gen_bool(self.best_effort_loss)
        {
            return;
        }

        inbox.frames.push(Delivered { frame: frame.clone(), delivery });
    }

    /// Inbox of a session, open or closed.
    pub fn inbox(&self, session_id: u64) -> Option<&Inbox> {
        self.inboxes.get(&session_id)
    }

    /// Decoded payloads a session has received.
    ///
    /// Frames that fail to decode are skipped.
    pub fn received(&self, session_id: u64) -> Vec<Payload> {
        self.inboxes
            .get(&session_id)
            .map(|inbox| {
                inbox.frames.iter().filter_map(|d| Payload::from_frame(&d.frame).ok()).collect()
            })
            .unwrap_or_default()
    }

    /// Number of frames a session has received.
    pub fn received_count(&self, session_id: u64) -> usize {
        self.inboxes.get(&session_id).map_or(0, |inbox| inbox.frames.len())
    }

    /// Forget everything a session has received so far.
    pub fn clear_received(&mut self, session_id: u64) {
        if let Some(inbox) = self.inboxes.get_mut(&session_id) {
            inbox.frames.clear();
        }
    }

    /// Session is still connected.
    pub fn is_open(&self, session_id: u64) -> bool {
        self.inboxes.get(&session_id).is_some_and(Inbox::is_open)
    }

    /// Why a session was closed.
    pub fn close_reason(&self, session_id: u64) -> Option<&str> {
        self.inboxes.get(&session_id).and_then(Inbox::close_reason)
    }

    /// Frames addressed to closed or unknown sessions.
    pub fn stray_deliveries(&self) -> usize {
        self.stray_deliveries
    }

    /// Driver log output, oldest first.
    pub fn logs(&self) -> &[(LogLevel, String)] {
        &self.logs
    }

    /// Logs at exactly `level`.
    pub fn logs_at(&self, level: LogLevel) -> impl Iterator<Item = &str> + '_ {
        self.logs.iter().filter(move |(l, _)| *l == level).map(|(_, message)| message.as_str())
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &ServerDriver<SimEnv> {
        &self.driver
    }

    /// The simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> HubSnapshot {
        let registry = self.driver.registry();

        let sessions = self
            .inboxes
            .iter()
            .map(|(&id, inbox)| SessionSnapshot {
                id,
                open: inbox.is_open(),
                registered_role: registry.role(id),
                name: registry.session(id).and_then(|info| info.name.clone()),
                group: registry.session(id).and_then(|info| info.group.clone()),
                received: inbox
                    .frames
                    .iter()
                    .filter_map(|d| Payload::from_frame(&d.frame).ok())
                    .collect(),
            })
            .collect();

        HubSnapshot {
            sessions,
            role_index: Role::ASSIGNED
                .iter()
                .map(|&role| (role, registry.sessions_with_role(role).collect()))
                .collect(),
            supervisor_present: self.driver.supervisor_present(),
            permissions: self.driver.config().permissions.clone(),
            stray_deliveries: self.stray_deliveries,
        }
    }
}

impl std::fmt::Debug for SimHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimHub")
            .field("driver", &self.driver)
            .field("sessions", &self.inboxes.len())
            .field("stray_deliveries", &self.stray_deliveries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use relayhub_core::ClassifierConfig;
    use relayhub_proto::payloads::session::{StatusUpdate, SystemAlert};
    use relayhub_server::ALERT_AUTH_FAILED;

    use super::*;

    fn hub() -> SimHub {
        SimHub::new(DriverConfig {
            classifier: ClassifierConfig::default().with_supervisor_key("k"),
            ..DriverConfig::default()
        })
    }

    #[test]
    fn connect_allocates_sequential_ids() {
        let mut hub = hub();
        assert_eq!(hub.connect().unwrap(), 1);
        assert_eq!(hub.connect().unwrap(), 2);
        assert_eq!(hub.received(1), vec![Payload::StatusUpdate(StatusUpdate {
            admin_present: false
        })]);
    }

    #[test]
    fn termination_closes_inbox_after_alert() {
        let mut hub = hub();
        let id = hub.join("admin", Some("nope")).unwrap();

        assert!(!hub.is_open(id));
        assert!(hub.driver().role(id).is_none());
        assert!(matches!(hub.received(id).last(),
            Some(Payload::SystemAlert(SystemAlert { reason })) if reason == ALERT_AUTH_FAILED));
        assert_eq!(hub.stray_deliveries(), 0);
    }

    #[test]
    fn total_loss_drops_only_best_effort() {
        let mut hub = hub();
        hub.set_best_effort_loss(1.0);
        let admin = hub.join("admin", Some("k")).unwrap();
        let node = hub.join("sarah_phone1", None).unwrap();
        hub.clear_received(admin);

        hub.screen(node, "sarah_phone1", vec![1]).unwrap();
        hub.activity(node, "sarah_phone1", "sms", &["hi"]).unwrap();

        assert_eq!(hub.driver().role(node), Some(Role::Node));
        assert!(matches!(hub.received(admin).as_slice(), [Payload::ActivityLog(_)]));
    }

    #[test]
    fn disconnect_twice_is_harmless() {
        let mut hub = hub();
        let id = hub.join("sarah", None).unwrap();
        hub.disconnect(id).unwrap();
        hub.disconnect(id).unwrap();
        assert_eq!(hub.driver().connection_count(), 0);
    }
}
