//! Server driver.
//!
//! Ties together the role classifier, the permission resolver and the
//! connection registry. The driver is Sans-IO: it consumes [`ServerEvent`]s
//! and returns [`ServerAction`]s for the runtime to execute. It owns all
//! relay state; nothing else mutates the registry.

use std::time::Duration;

use relayhub_core::{
    ClassifierConfig, Environment, PermissionPolicy, RelayError, Role, classify, normalize_name,
};
use relayhub_proto::{
    Frame, FrameFlags, Opcode, Payload,
    payloads::{
        ErrorPayload,
        command::{Command, NodePresence},
        relay::{ActivityBatch, ActivityLog},
        session::{ClaimRole, RoleAssigned, RoleKind, SetVisibility, StatusUpdate, SystemAlert},
    },
};

use crate::{
    registry::{Assignment, ConnectionRegistry, SessionInfo},
    resolver,
    server_error::DriverError,
};

/// Alert sent before terminating a failed supervisor claim.
pub const ALERT_AUTH_FAILED: &str = "authentication failed";
/// Alert sent when the single supervisor slot is taken.
pub const ALERT_HUB_OCCUPIED: &str = "hub occupied";
/// Alert sent when the monitor cap is reached.
pub const ALERT_MONITOR_SLOTS_FULL: &str = "monitor slots full";

/// How supervisors share the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupervisorMode {
    /// At most one supervisor. A second valid claim is rejected.
    SingleSlot,
    /// Any number of key-verified supervisors.
    #[default]
    Group,
}

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
    /// Reserved supervisor name and key
    pub classifier: ClassifierConfig,
    /// Single-slot or group supervisors
    pub supervisor_mode: SupervisorMode,
    /// Which monitors see which nodes
    pub permissions: PermissionPolicy,
    /// Cap on concurrent monitors. `None` is unlimited.
    pub max_monitors: Option<usize>,
    /// Command action that schedules the follow-up
    pub live_action: String,
    /// Follow-up command action
    pub eco_action: String,
    /// Delay before the follow-up fires
    pub eco_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            classifier: ClassifierConfig::default(),
            supervisor_mode: SupervisorMode::default(),
            permissions: PermissionPolicy::default(),
            max_monitors: None,
            live_action: "START_LIVE".to_string(),
            eco_action: "START_ECO".to_string(),
            eco_delay: Duration::from_secs(300),
        }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the external runtime (simulation or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
    },

    /// A frame was received from a connection
    FrameReceived {
        /// Connection that sent the frame
        session_id: u64,
        /// The received frame
        frame: Frame,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Periodic tick for delayed commands
    Tick,
}

/// Delivery guarantee for an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued until the recipient's writer accepts it
    Reliable,
    /// Dropped if the recipient is not keeping up
    BestEffort,
}

/// Actions that the server driver produces.
///
/// These are executed by runtime-specific code (production or simulation).
#[derive(Debug, Clone)]
pub enum ServerAction<I> {
    /// Send a frame to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Frame to send
        frame: Frame,
        /// Delivery guarantee
        delivery: Delivery,
    },

    /// Send one frame to a snapshot of recipients
    Broadcast {
        /// Recipient session IDs, fixed when the action was produced
        recipients: Vec<u64>,
        /// Frame to send
        frame: Frame,
        /// Delivery guarantee
        delivery: Delivery,
    },

    /// Close a connection after flushing its reliable queue
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Log a message (for debugging/monitoring)
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
        /// When the event occurred
        timestamp: I,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// Follow-up command waiting for its due time.
#[derive(Debug, Clone)]
struct DelayedCommand<I> {
    due: I,
    target: Option<u64>,
}

/// Required role and action name for client opcodes.
///
/// `None` for opcodes only the server may send.
fn required_role(opcode: Opcode) -> Option<(Role, &'static str)> {
    match opcode {
        Opcode::ClaimRole => Some((Role::Unassigned, "claim_role")),
        Opcode::SetVisibility => Some((Role::Monitor, "set_visibility")),
        Opcode::ScreenFrame => Some((Role::Node, "screen_frame")),
        Opcode::Sample => Some((Role::Node, "sample")),
        Opcode::ActivityBatch => Some((Role::Node, "activity_batch")),
        Opcode::Command => Some((Role::Supervisor, "command")),
        Opcode::RoleAssigned
        | Opcode::SystemAlert
        | Opcode::StatusUpdate
        | Opcode::ActivityLog
        | Opcode::NodePresence
        | Opcode::Error => None,
    }
}

/// Action-based server driver.
///
/// Orchestrates role assignment, relay routing and lifecycle cleanup.
pub struct ServerDriver<E>
where
    E: Environment,
{
    /// Session/role registry
    registry: ConnectionRegistry,
    /// Scheduled follow-up commands
    delayed: Vec<DelayedCommand<E::Instant>>,
    /// Environment (time, RNG)
    env: E,
    /// Driver configuration
    config: DriverConfig,
}

impl<E> ServerDriver<E>
where
    E: Environment,
{
    /// Create a new server driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        Self { registry: ConnectionRegistry::new(), delayed: Vec::new(), env, config }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    ///
    /// # Errors
    ///
    /// - `DriverError::SessionNotFound` for a frame from an unknown session
    /// - `DriverError::SessionAlreadyExists` if the runtime reuses a live ID
    /// - `DriverError::Protocol` if a server-generated frame fails to encode
    pub fn process_event(
        &mut self,
        event: ServerEvent,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            ServerEvent::FrameReceived { session_id, frame } => {
                self.handle_frame_received(session_id, frame)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                self.handle_connection_closed(session_id, &reason)
            },
            ServerEvent::Tick => self.handle_tick(),
        }
    }

    /// Handle a new connection being accepted.
    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        if self.registry.session_count() >= self.config.max_connections {
            return Ok(vec![
                ServerAction::CloseConnection {
                    session_id,
                    reason: "max connections exceeded".to_string(),
                },
                self.log(
                    LogLevel::Warn,
                    format!("connection {session_id} rejected: max connections exceeded"),
                ),
            ]);
        }

        if !self.registry.register_session(session_id) {
            return Err(DriverError::SessionAlreadyExists(session_id));
        }

        let status = server_frame(Payload::StatusUpdate(StatusUpdate {
            admin_present: self.registry.supervisor_present(),
        }))?;

        Ok(vec![
            ServerAction::SendToSession { session_id, frame: status, delivery: Delivery::Reliable },
            self.log(LogLevel::Debug, format!("connection accepted, session_id={session_id}")),
        ])
    }

    /// Handle a frame received from a connection.
    fn handle_frame_received(
        &mut self,
        session_id: u64,
        mut frame: Frame,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let role = self.registry.role(session_id).ok_or(DriverError::SessionNotFound(session_id))?;

        // Origin is always the server's view of the sender.
        frame.header.set_session_id(session_id);

        let Some(opcode) = frame.header.opcode_enum() else {
            let code = frame.header.opcode();
            return self.error_response(session_id, ErrorPayload::unsupported_opcode(code));
        };

        let Some((required, action)) = required_role(opcode) else {
            let code = opcode.to_u16();
            return self.error_response(session_id, ErrorPayload::unsupported_opcode(code));
        };

        if role != required {
            let err = RelayError::RoleConflict { session_id, action };
            return Ok(vec![self.log_unanswered("ignored", &err)]);
        }

        if opcode.is_relay() && opcode != Opcode::ActivityBatch {
            return self.handle_relay(session_id, opcode, frame);
        }

        let payload = match Payload::decode(opcode, &frame.payload) {
            Ok(payload) => payload,
            Err(e) => {
                return self.error_response(
                    session_id,
                    ErrorPayload::invalid_payload(format!("{action}: {e}")),
                );
            },
        };

        match payload {
            Payload::ClaimRole(claim) => self.handle_claim(session_id, claim),
            Payload::SetVisibility(visibility) => {
                Ok(self.handle_visibility(session_id, visibility))
            },
            Payload::ActivityBatch(batch) => self.handle_activity(session_id, batch),
            Payload::Command(command) => self.handle_command(session_id, command, frame),
            other => {
                let code = other.opcode().to_u16();
                self.error_response(session_id, ErrorPayload::unsupported_opcode(code))
            },
        }
    }

    /// Classify a role claim and apply the verdict.
    fn handle_claim(
        &mut self,
        session_id: u64,
        claim: ClaimRole,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let verdict = match classify(&claim.name, claim.key.as_deref(), &self.config.classifier) {
            Ok(verdict) => verdict,
            Err(err) if err.terminates_connection() => {
                return self.terminate(session_id, ALERT_AUTH_FAILED, &err.to_string());
            },
            Err(err) => {
                let context = format!("session {session_id}: claim ignored");
                return Ok(vec![self.log_unanswered(&context, &err)]);
            },
        };

        match verdict.role {
            RoleKind::Supervisor
                if self.config.supervisor_mode == SupervisorMode::SingleSlot
                    && self.registry.supervisor_present() =>
            {
                return self.terminate(session_id, ALERT_HUB_OCCUPIED, "supervisor slot taken");
            },
            RoleKind::Monitor
                if self
                    .config
                    .max_monitors
                    .is_some_and(|max| self.registry.role_count(Role::Monitor) >= max) =>
            {
                return self.terminate(session_id, ALERT_MONITOR_SLOTS_FULL, "monitor cap reached");
            },
            _ => {},
        }

        let admin_was_present = self.registry.supervisor_present();
        let net_type = if verdict.role == RoleKind::Node { claim.net_type } else { None };

        let assigned = self.registry.assign_role(session_id, Assignment {
            role: verdict.role.into(),
            name: verdict.name.clone(),
            group: verdict.group.clone(),
            net_type: net_type.clone(),
        });
        if !assigned {
            return Ok(vec![self.log(
                LogLevel::Warn,
                format!("session {session_id}: role assignment rejected by registry"),
            )]);
        }

        let confirmation = server_frame(Payload::RoleAssigned(RoleAssigned {
            role: verdict.role,
            name: verdict.name.clone(),
        }))?;

        let mut actions = vec![
            ServerAction::SendToSession {
                session_id,
                frame: confirmation,
                delivery: Delivery::Reliable,
            },
            self.log(
                LogLevel::Info,
                format!(
                    "session {session_id} assigned {:?} as '{}' ({})",
                    verdict.role, verdict.name, verdict.reason
                ),
            ),
        ];

        match verdict.role {
            RoleKind::Supervisor if !admin_was_present => {
                actions.push(self.status_broadcast(true)?);
            },
            RoleKind::Node => {
                actions.extend(self.presence_announcement(NodePresence {
                    session_id,
                    name: verdict.name,
                    net_type,
                    online: true,
                })?);
            },
            _ => {},
        }

        Ok(actions)
    }

    /// Toggle a monitor's visibility.
    fn handle_visibility(
        &mut self,
        session_id: u64,
        visibility: SetVisibility,
    ) -> Vec<ServerAction<E::Instant>> {
        self.registry.set_hidden(session_id, visibility.hidden);
        vec![self.log(
            LogLevel::Debug,
            format!("session {session_id} visibility hidden={}", visibility.hidden),
        )]
    }

    /// Forward a screen frame or sample verbatim to its observers.
    fn handle_relay(
        &mut self,
        session_id: u64,
        opcode: Opcode,
        mut frame: Frame,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        // Samples must decode in full. Screen frames are only peeked.
        let subject = match opcode {
            Opcode::Sample => match Payload::decode(opcode, &frame.payload) {
                Ok(Payload::Sample(sample)) => Ok(sample.subject),
                Ok(other) => Err(format!("sample decoded as {:?}", other.opcode())),
                Err(e) => Err(e.to_string()),
            },
            _ => Payload::relay_subject(&frame).map_err(|e| e.to_string()),
        };
        let subject = match subject {
            Ok(subject) => subject,
            Err(message) => {
                let error = ErrorPayload::invalid_payload(format!("{opcode:?}: {message}"));
                return self.error_response(session_id, error);
            },
        };

        let Some(name) = self.verified_subject(session_id, &subject) else {
            return Ok(vec![self.spoof_warning(session_id, &subject)]);
        };

        let recipients = resolver::recipients_for(
            &self.registry,
            &self.config.permissions,
            session_id,
            &name,
            None,
        );
        if recipients.is_empty() {
            let message = format!("no observers for '{name}', dropping {opcode:?}");
            return Ok(vec![self.log(LogLevel::Debug, message)]);
        }

        let delivery = if opcode == Opcode::ScreenFrame {
            frame.header.set_flags(frame.header.flags().with(FrameFlags::VOLATILE));
            Delivery::BestEffort
        } else {
            Delivery::Reliable
        };

        Ok(vec![ServerAction::Broadcast { recipients, frame, delivery }])
    }

    /// Expand an activity batch into one log per record for supervisors.
    fn handle_activity(
        &mut self,
        session_id: u64,
        batch: ActivityBatch,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let Some(name) = self.verified_subject(session_id, &batch.subject) else {
            return Ok(vec![self.spoof_warning(session_id, &batch.subject)]);
        };

        let supervisors: Vec<u64> = self.registry.supervisors().collect();
        if supervisors.is_empty() {
            return Ok(vec![self.log(
                LogLevel::Debug,
                format!("no supervisors, dropping {} activity records", batch.records.len()),
            )]);
        }

        let timestamp_ms = self.env.wall_clock_millis();
        let mut actions = Vec::with_capacity(batch.records.len());

        for record in batch.records {
            let mut frame = server_frame(Payload::ActivityLog(ActivityLog {
                timestamp_ms,
                subject: name.clone(),
                kind: batch.kind.clone(),
                message: record.message,
            }))?;
            frame.header.set_session_id(session_id);

            actions.push(ServerAction::Broadcast {
                recipients: supervisors.clone(),
                frame,
                delivery: Delivery::Reliable,
            });
        }

        Ok(actions)
    }

    /// Forward a supervisor command and schedule its follow-up.
    fn handle_command(
        &mut self,
        session_id: u64,
        command: Command,
        frame: Frame,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let recipients = resolver::recipients_for(
            &self.registry,
            &self.config.permissions,
            session_id,
            "",
            command.target,
        );

        let mut actions = Vec::new();

        match command.target {
            Some(target) if recipients.is_empty() => {
                let err = RelayError::RecipientUnavailable(target);
                let context = format!("command '{}' dropped", command.action);
                actions.push(self.log_unanswered(&context, &err));
            },
            _ => {
                actions.push(self.log(
                    LogLevel::Info,
                    format!(
                        "session {session_id} issued '{}' to {} node(s)",
                        command.action,
                        recipients.len()
                    ),
                ));
                if !recipients.is_empty() {
                    actions.push(ServerAction::Broadcast {
                        recipients,
                        frame,
                        delivery: Delivery::Reliable,
                    });
                }
            },
        }

        if command.action == self.config.live_action {
            let due = self.env.add(self.env.now(), self.config.eco_delay);
            self.delayed.push(DelayedCommand { due, target: command.target });
            actions.push(self.log(
                LogLevel::Debug,
                format!(
                    "scheduled '{}' in {:?} for {}",
                    self.config.eco_action,
                    self.config.eco_delay,
                    describe_target(command.target)
                ),
            ));
        }

        Ok(actions)
    }

    /// Handle a connection being closed.
    fn handle_connection_closed(
        &mut self,
        session_id: u64,
        reason: &str,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let Some((info, mut actions)) = self.remove_session(session_id)? else {
            return Ok(vec![self.log(
                LogLevel::Debug,
                format!("session {session_id} closed after removal: {reason}"),
            )]);
        };

        actions.push(self.log(
            LogLevel::Debug,
            format!("session {session_id} ({:?}) closed: {reason}", info.role),
        ));

        Ok(actions)
    }

    /// Fire every delayed command that is due.
    fn handle_tick(&mut self) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let now = self.env.now();
        let (due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.delayed).into_iter().partition(|cmd| cmd.due <= now);
        self.delayed = pending;

        let mut actions = Vec::new();

        for cmd in due {
            let recipients = resolver::command_recipients(&self.registry, None, cmd.target);
            if recipients.is_empty() {
                actions.push(self.log(
                    LogLevel::Debug,
                    format!(
                        "delayed '{}' for {} has no recipients",
                        self.config.eco_action,
                        describe_target(cmd.target)
                    ),
                ));
                continue;
            }

            let frame = server_frame(Payload::Command(Command {
                target: cmd.target,
                action: self.config.eco_action.clone(),
            }))?;

            actions.push(self.log(
                LogLevel::Info,
                format!(
                    "delayed '{}' sent to {} node(s)",
                    self.config.eco_action,
                    recipients.len()
                ),
            ));
            actions.push(ServerAction::Broadcast {
                recipients,
                frame,
                delivery: Delivery::Reliable,
            });
        }

        Ok(actions)
    }

    /// Alert, close and forget a session.
    fn terminate(
        &mut self,
        session_id: u64,
        alert: &str,
        detail: &str,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let frame = server_frame(Payload::SystemAlert(SystemAlert { reason: alert.to_string() }))?;

        let mut actions = vec![
            ServerAction::SendToSession { session_id, frame, delivery: Delivery::Reliable },
            ServerAction::CloseConnection { session_id, reason: alert.to_string() },
        ];

        if let Some((_, cleanup)) = self.remove_session(session_id)? {
            actions.extend(cleanup);
        }

        let message = format!("session {session_id} terminated: {detail}");
        actions.push(self.log(LogLevel::Warn, message));
        Ok(actions)
    }

    /// Remove a session and announce what its departure changes.
    ///
    /// `None` if the session was already gone.
    #[allow(clippy::type_complexity)]
    fn remove_session(
        &mut self,
        session_id: u64,
    ) -> Result<Option<(SessionInfo, Vec<ServerAction<E::Instant>>)>, DriverError> {
        let Some(info) = self.registry.unregister_session(session_id) else {
            return Ok(None);
        };

        let mut actions = Vec::new();

        match info.role {
            Role::Node => {
                actions.extend(self.presence_announcement(NodePresence {
                    session_id,
                    name: info.name.clone().unwrap_or_default(),
                    net_type: info.net_type.clone(),
                    online: false,
                })?);
            },
            Role::Supervisor if !self.registry.supervisor_present() => {
                if self.registry.session_count() > 0 {
                    actions.push(self.status_broadcast(false)?);
                }
            },
            _ => {},
        }

        Ok(Some((info, actions)))
    }

    /// `StatusUpdate` to every connection.
    fn status_broadcast(
        &self,
        admin_present: bool,
    ) -> Result<ServerAction<E::Instant>, DriverError> {
        let frame = server_frame(Payload::StatusUpdate(StatusUpdate { admin_present }))?;
        Ok(ServerAction::Broadcast {
            recipients: self.registry.session_ids(),
            frame,
            delivery: Delivery::Reliable,
        })
    }

    /// `NodePresence` to every supervisor. Empty if none are connected.
    fn presence_announcement(
        &self,
        presence: NodePresence,
    ) -> Result<Option<ServerAction<E::Instant>>, DriverError> {
        let recipients: Vec<u64> = self.registry.supervisors().collect();
        if recipients.is_empty() {
            return Ok(None);
        }

        let frame = server_frame(Payload::NodePresence(presence))?;
        Ok(Some(ServerAction::Broadcast { recipients, frame, delivery: Delivery::Reliable }))
    }

    /// Normalized subject if it is the sender's registered name.
    fn verified_subject(&self, session_id: u64, subject: &str) -> Option<String> {
        let subject = normalize_name(subject);
        let registered = self.registry.session(session_id)?.name.as_deref()?;
        (registered == subject).then_some(subject)
    }

    fn spoof_warning(&self, session_id: u64, subject: &str) -> ServerAction<E::Instant> {
        self.log(
            LogLevel::Warn,
            format!("session {session_id} sent data for '{subject}' under another name, dropped"),
        )
    }

    fn error_response(
        &self,
        session_id: u64,
        error: ErrorPayload,
    ) -> Result<Vec<ServerAction<E::Instant>>, DriverError> {
        let message = error.message.clone();
        let frame = server_frame(Payload::Error(error))?;

        Ok(vec![
            ServerAction::SendToSession { session_id, frame, delivery: Delivery::Reliable },
            self.log(LogLevel::Warn, format!("rejected frame from {session_id}: {message}")),
        ])
    }

    fn log(&self, level: LogLevel, message: String) -> ServerAction<E::Instant> {
        ServerAction::Log { level, message, timestamp: self.env.now() }
    }

    /// Log an error the sender gets no reply for.
    ///
    /// Silent errors are routine and stay at debug.
    fn log_unanswered(&self, context: &str, err: &RelayError) -> ServerAction<E::Instant> {
        let level = if err.is_silent() { LogLevel::Debug } else { LogLevel::Info };
        self.log(level, format!("{context}: {err}"))
    }

    /// Session metadata. `None` if session doesn't exist.
    pub fn session(&self, session_id: u64) -> Option<&SessionInfo> {
        self.registry.session(session_id)
    }

    /// Role of a session. `None` if session doesn't exist.
    pub fn role(&self, session_id: u64) -> Option<Role> {
        self.registry.role(session_id)
    }

    /// Read-only view of the registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.registry.session_count()
    }

    /// At least one supervisor is connected.
    pub fn supervisor_present(&self) -> bool {
        self.registry.supervisor_present()
    }

    /// Number of follow-up commands not yet fired.
    pub fn pending_delayed_commands(&self) -> usize {
        self.delayed.len()
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Environment the driver runs in.
    pub fn env(&self) -> &E {
        &self.env
    }
}

impl<E> std::fmt::Debug for ServerDriver<E>
where
    E: Environment,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerDriver")
            .field("session_count", &self.registry.session_count())
            .field("supervisor_present", &self.registry.supervisor_present())
            .field("pending_delayed_commands", &self.delayed.len())
            .finish()
    }
}

/// Encode a server-originated payload.
fn server_frame(payload: Payload) -> Result<Frame, DriverError> {
    Ok(payload.into_frame()?)
}

fn describe_target(target: Option<u64>) -> String {
    match target {
        Some(id) => format!("session {id}"),
        None => "all nodes".to_string(),
    }
}
