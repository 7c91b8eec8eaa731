//! Relayhub production server.
//!
//! Production server implementation using Quinn for QUIC transport, Tokio for
//! async runtime, and system time with cryptographic RNG.
//!
//! # Architecture
//!
//! [`ServerDriver`] holds every piece of relay state and follows the Sans-IO
//! pattern: events in, actions out. [`Server`] owns the I/O. It feeds the
//! driver events from QUIC connections and a periodic tick, then executes the
//! returned actions through per-connection outbound queues.
//!
//! The driver and the outbound queues sit behind one `tokio::sync::Mutex`.
//! An event's actions are queued before the lock is released, so every
//! connection sees frames in the order the driver produced them. Queueing
//! never waits: a connection whose reliable queue is full is closed instead
//! of stalling everyone else.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`Server`]: Production runtime that executes driver actions
//! - [`QuinnTransport`]: QUIC transport via Quinn library
//! - [`OutboundHandle`]: reliable and best-effort queues to one connection
//! - [`Dispatcher`]: executes driver actions against the queues
//! - [`SystemEnv`]: Production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
pub mod outbound;
mod registry;
pub mod resolver;
mod server_error;
mod system_env;
mod transport;

use std::{sync::Arc, time::Duration};

use bytes::BytesMut;
pub use driver::{
    ALERT_AUTH_FAILED, ALERT_HUB_OCCUPIED, ALERT_MONITOR_SLOTS_FULL, Delivery, DriverConfig,
    LogLevel, ServerAction, ServerDriver, ServerEvent, SupervisorMode,
};
pub use error::ServerError;
pub use outbound::{Dispatcher, OutboundHandle, OutboundMessage, QueueError, WriterExit};
pub use registry::{Assignment, ConnectionRegistry, SessionInfo};
use relayhub_core::{Environment, RelayError};
use relayhub_proto::{Frame, FrameHeader, ProtocolError};
pub use server_error::DriverError;
pub use system_env::SystemEnv;
use tokio::sync::Mutex;
pub use transport::{QuinnConnection, QuinnTransport};

type SharedHub = Arc<Mutex<Hub<SystemEnv>>>;

/// How long a closing connection may take to deliver its final frames.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// The driver and the queues its actions feed.
struct Hub<E: Environment> {
    driver: ServerDriver<E>,
    outbound: Dispatcher,
}

impl<E: Environment> Hub<E> {
    fn new(driver: ServerDriver<E>) -> Self {
        Self { driver, outbound: Dispatcher::new() }
    }

    /// Process an event and queue everything it produced.
    fn handle(&mut self, event: ServerEvent) -> Result<(), DriverError> {
        let actions = self.driver.process_event(event)?;
        self.outbound.execute(actions);
        Ok(())
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4433")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Interval between driver ticks
    pub tick_interval: Duration,
    /// Reliable frames buffered per connection
    pub reliable_queue_depth: usize,
    /// Best-effort frames buffered per connection
    pub volatile_queue_depth: usize,
    /// Driver configuration (roles, permissions, limits)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4433".to_string(),
            cert_path: None,
            key_path: None,
            tick_interval: Duration::from_secs(1),
            reliable_queue_depth: 256,
            volatile_queue_depth: 2,
            driver: DriverConfig::default(),
        }
    }
}

/// Queue depths handed to each connection.
#[derive(Debug, Clone, Copy)]
struct QueueDepths {
    reliable: usize,
    volatile: usize,
}

/// Production relayhub server.
///
/// Wraps `ServerDriver` with Quinn QUIC transport and system environment.
pub struct Server {
    /// The action-based server driver
    driver: ServerDriver<SystemEnv>,
    /// QUIC endpoint
    transport: QuinnTransport,
    /// Environment
    env: SystemEnv,
    /// Tick interval
    tick_interval: Duration,
    /// Per-connection queue depths
    depths: QueueDepths,
}

impl Server {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` for a bad address or TLS files
    /// - `ServerError::Transport` if the socket cannot be bound
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();
        let driver = ServerDriver::new(env.clone(), config.driver);

        let transport =
            QuinnTransport::bind(&config.bind_address, config.cert_path, config.key_path)?;

        Ok(Self {
            driver,
            transport,
            env,
            tick_interval: config.tick_interval,
            depths: QueueDepths {
                reliable: config.reliable_queue_depth,
                volatile: config.volatile_queue_depth,
            },
        })
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// This method runs until the endpoint is closed.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if the local address is unavailable
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let env = self.env;
        let depths = self.depths;
        let hub: SharedHub = Arc::new(Mutex::new(Hub::new(self.driver)));

        tokio::spawn(run_ticks(Arc::clone(&hub), self.tick_interval));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let hub = Arc::clone(&hub);
                    let env = env.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, hub, env, depths).await {
                            tracing::warn!("Connection error: {}", e);
                        }
                    });
                },
                Err(ServerError::Transport(msg)) if msg == "endpoint closed" => {
                    tracing::info!("Endpoint closed, shutting down");
                    return Ok(());
                },
                Err(e) => {
                    tracing::debug!("Accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if the socket address is unavailable
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Drive delayed commands.
async fn run_ticks(hub: SharedHub, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Err(e) = hub.lock().await.handle(ServerEvent::Tick) {
            tracing::error!("Tick processing error: {}", e);
        }
    }
}

/// Handle a single QUIC connection.
async fn handle_connection(
    conn: QuinnConnection,
    hub: SharedHub,
    env: SystemEnv,
    depths: QueueDepths,
) -> Result<(), ServerError> {
    let session_id = env.random_u64();

    tracing::debug!("New connection {} from {}", session_id, conn.remote_addr());

    let mut outbound_stream = conn.open_uni().await?;
    let (handle, queues) = OutboundHandle::channel(depths.reliable, depths.volatile);

    let writer_conn = conn.clone();
    tokio::spawn(async move {
        match outbound::run_writer(&mut outbound_stream, queues).await {
            WriterExit::Closed(reason) => {
                let _ = tokio::time::timeout(CLOSE_GRACE, outbound_stream.stopped()).await;
                writer_conn.close(&reason);
            },
            WriterExit::Detached => {},
            WriterExit::Overflowed => {
                tracing::warn!("Closing {}: outbound queue overflow", session_id);
                writer_conn.close("outbound queue overflow");
            },
            WriterExit::Failed(e) => {
                tracing::debug!("Outbound stream for {} failed: {}", session_id, e);
                writer_conn.close("outbound stream failed");
            },
        }
    });

    {
        let mut guard = hub.lock().await;
        guard.outbound.attach(session_id, handle);
        if let Err(e) = guard.handle(ServerEvent::ConnectionAccepted { session_id }) {
            guard.outbound.detach(session_id);
            drop(guard);
            conn.close("session setup failed");
            return Err(e.into());
        }
    }

    loop {
        match conn.accept_uni().await {
            Ok(recv) => {
                let hub = Arc::clone(&hub);
                let conn = conn.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_stream(session_id, recv, conn, hub).await {
                        tracing::debug!("Stream error on {}: {}", session_id, e);
                    }
                });
            },
            Err(e) => {
                tracing::debug!("Connection {} closed: {}", session_id, e);
                break;
            },
        }
    }

    let mut guard = hub.lock().await;
    guard.outbound.detach(session_id);
    guard.handle(ServerEvent::ConnectionClosed {
        session_id,
        reason: "connection closed".to_string(),
    })?;

    Ok(())
}

/// Read frames from one inbound stream until it ends.
///
/// An oversize or malformed header closes the whole connection.
async fn handle_stream(
    session_id: u64,
    mut recv: quinn::RecvStream,
    conn: QuinnConnection,
    hub: SharedHub,
) -> Result<(), ServerError> {
    let mut head = [0u8; FrameHeader::SIZE];

    loop {
        if let Err(e) = recv.read_exact(&mut head).await {
            tracing::debug!("Inbound stream for {} ended: {}", session_id, e);
            return Ok(());
        }

        let header = match FrameHeader::from_bytes(&head) {
            Ok(header) => *header,
            Err(ProtocolError::PayloadTooLarge { size, max }) => {
                let err = RelayError::PayloadTooLarge { size, max };
                tracing::warn!("Closing {}: {}", session_id, err);
                conn.close("payload too large");
                return Err(ServerError::Protocol(err.to_string()));
            },
            Err(e) => {
                tracing::warn!("Closing {}: invalid frame header: {}", session_id, e);
                conn.close("protocol error");
                return Err(e.into());
            },
        };

        let mut payload = BytesMut::zeroed(header.payload_size() as usize);
        if let Err(e) = recv.read_exact(&mut payload).await {
            tracing::debug!("Payload read error for {}: {}", session_id, e);
            return Ok(());
        }

        let frame = Frame::new(header, payload.freeze());

        let event = ServerEvent::FrameReceived { session_id, frame };
        if let Err(e) = hub.lock().await.handle(event) {
            tracing::warn!("Frame processing error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use relayhub_core::ClassifierConfig;
    use relayhub_proto::{
        Payload,
        payloads::{
            command::{Command, NodePresence},
            session::ClaimRole,
        },
    };
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::outbound::OutboundQueues;

    const KEY: &str = "hunter2";

    fn hub() -> Hub<SystemEnv> {
        let config = DriverConfig {
            classifier: ClassifierConfig::default().with_supervisor_key(KEY),
            ..DriverConfig::default()
        };
        Hub::new(ServerDriver::new(SystemEnv::new(), config))
    }

    fn frame(payload: Payload) -> Frame {
        payload.into_frame().unwrap()
    }

    /// Attach a connection with the given reliable depth, accept it and claim
    /// `name`.
    fn join(
        hub: &mut Hub<SystemEnv>,
        session_id: u64,
        name: &str,
        key: Option<&str>,
        reliable_depth: usize,
    ) -> OutboundQueues {
        let (handle, queues) = OutboundHandle::channel(reliable_depth, 2);
        hub.outbound.attach(session_id, handle);
        hub.handle(ServerEvent::ConnectionAccepted { session_id }).unwrap();

        let claim = Payload::ClaimRole(ClaimRole {
            name: name.to_string(),
            key: key.map(str::to_string),
            net_type: None,
        });
        hub.handle(ServerEvent::FrameReceived { session_id, frame: frame(claim) }).unwrap();
        queues
    }

    /// Detach a session and decode everything its writer would put on the
    /// wire.
    async fn drain(
        hub: &mut Hub<SystemEnv>,
        session_id: u64,
        queues: OutboundQueues,
    ) -> (WriterExit, Vec<Payload>) {
        if let Some(handle) = hub.outbound.detach(session_id) {
            let _ = handle.close("drained".to_string());
        }

        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        let exit = outbound::run_writer(&mut server, queues).await;
        drop(server);

        let mut wire = Vec::new();
        client.read_to_end(&mut wire).await.unwrap();

        let mut payloads = Vec::new();
        let mut rest = wire.as_slice();
        while !rest.is_empty() {
            let frame = Frame::decode(rest).unwrap();
            rest = &rest[frame.encoded_len()..];
            payloads.push(Payload::from_frame(&frame).unwrap());
        }
        (exit, payloads)
    }

    fn presence(payloads: &[Payload]) -> Vec<(String, bool)> {
        payloads
            .iter()
            .filter_map(|p| match p {
                Payload::NodePresence(NodePresence { name, online, .. }) => {
                    Some((name.clone(), *online))
                },
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn node_join_and_leave_reach_supervisor_in_order() {
        let mut hub = hub();
        let admin = join(&mut hub, 1, "admin", Some(KEY), 64);

        // The node's own queue overflows on its claim; that must not disturb
        // what the supervisor sees.
        let node = join(&mut hub, 2, "sarah_phone1", None, 1);
        hub.outbound.detach(2);
        hub.handle(ServerEvent::ConnectionClosed { session_id: 2, reason: "gone".to_string() })
            .unwrap();

        let (exit, received) = drain(&mut hub, 1, admin).await;
        assert!(matches!(exit, WriterExit::Closed(_)));
        assert_eq!(presence(&received), vec![
            ("sarah_phone1".to_string(), true),
            ("sarah_phone1".to_string(), false),
        ]);

        let (exit, _) = drain(&mut hub, 2, node).await;
        assert!(matches!(exit, WriterExit::Overflowed));
    }

    #[tokio::test]
    async fn full_recipient_queue_does_not_stall_others() {
        let mut hub = hub();
        let admin = join(&mut hub, 1, "admin", Some(KEY), 64);
        let stalled = join(&mut hub, 2, "sarah_phone1", None, 2);
        let healthy = join(&mut hub, 3, "john_laptop", None, 64);

        let ping = Payload::Command(Command { target: None, action: "PING".to_string() });
        hub.handle(ServerEvent::FrameReceived { session_id: 1, frame: frame(ping.clone()) })
            .unwrap();
        hub.handle(ServerEvent::FrameReceived { session_id: 1, frame: frame(ping) }).unwrap();

        let (exit, _) = drain(&mut hub, 2, stalled).await;
        assert!(matches!(exit, WriterExit::Overflowed));

        let (exit, received) = drain(&mut hub, 3, healthy).await;
        assert!(matches!(exit, WriterExit::Closed(_)));
        let pings = received
            .iter()
            .filter(|p| matches!(p, Payload::Command(Command { action, .. }) if action == "PING"))
            .count();
        assert_eq!(pings, 2);

        let (_, received) = drain(&mut hub, 1, admin).await;
        assert_eq!(presence(&received).len(), 2);
    }
}
