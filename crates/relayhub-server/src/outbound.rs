//! Per-connection outbound queues and writer task.
//!
//! Every connection has exactly one writer task owning its outbound stream.
//! Two queues feed it:
//!
//! - reliable: bounded, senders never wait; a full queue faults the
//!   connection so no frame is silently skipped
//! - volatile: tiny, senders never wait (`try_send`), a full queue drops the
//!   frame
//!
//! Senders push while holding the driver lock, so frames reach each queue in
//! the order the driver produced them. The writer drains reliable messages
//! first. A [`OutboundMessage::Close`] travels through the reliable queue, so
//! everything queued before it is written before the connection is closed.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use bytes::{Bytes, BytesMut};
use relayhub_core::RelayError;
use relayhub_proto::Frame;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Notify, mpsc},
};

use crate::driver::{Delivery, LogLevel, ServerAction};

/// Message on the reliable queue.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Encoded frame
    Frame(Bytes),
    /// Flush, then close with this reason
    Close(String),
}

/// Why a reliable message could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is full. The connection has been faulted.
    Full,
    /// The writer is gone
    Closed,
}

/// Sending side of a connection's outbound queues.
///
/// Cheap to clone. Dropping every handle ends the writer.
#[derive(Debug, Clone)]
pub struct OutboundHandle {
    reliable: mpsc::Sender<OutboundMessage>,
    volatile: mpsc::Sender<Bytes>,
    dropped: Arc<AtomicU64>,
    overflowed: Arc<AtomicBool>,
    fault: Arc<Notify>,
}

/// Receiving side, owned by the writer task.
#[derive(Debug)]
pub struct OutboundQueues {
    reliable: mpsc::Receiver<OutboundMessage>,
    volatile: mpsc::Receiver<Bytes>,
    fault: Arc<Notify>,
}

/// Why a writer stopped.
#[derive(Debug)]
pub enum WriterExit {
    /// A close was requested after flushing
    Closed(String),
    /// Every handle was dropped
    Detached,
    /// The reliable queue overflowed
    Overflowed,
    /// The stream failed
    Failed(std::io::Error),
}

impl OutboundHandle {
    /// Create a handle and the queues it feeds.
    ///
    /// Depths are clamped to at least one.
    pub fn channel(reliable_depth: usize, volatile_depth: usize) -> (Self, OutboundQueues) {
        let (reliable_tx, reliable_rx) = mpsc::channel(reliable_depth.max(1));
        let (volatile_tx, volatile_rx) = mpsc::channel(volatile_depth.max(1));
        let fault = Arc::new(Notify::new());

        let handle = Self {
            reliable: reliable_tx,
            volatile: volatile_tx,
            dropped: Arc::new(AtomicU64::new(0)),
            overflowed: Arc::new(AtomicBool::new(false)),
            fault: Arc::clone(&fault),
        };

        (handle, OutboundQueues { reliable: reliable_rx, volatile: volatile_rx, fault })
    }

    /// Queue a frame without waiting.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Full`] if the queue is full now or overflowed earlier
    /// - [`QueueError::Closed`] if the writer is gone
    pub fn send_reliable(&self, frame: Bytes) -> Result<(), QueueError> {
        self.push(OutboundMessage::Frame(frame))
    }

    /// Queue a frame if there is room right now.
    ///
    /// Returns `false` and counts a drop if the queue is full or the writer
    /// is gone.
    pub fn send_volatile(&self, frame: Bytes) -> bool {
        if self.volatile.try_send(frame).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Ask the writer to flush and close.
    ///
    /// # Errors
    ///
    /// Same as [`OutboundHandle::send_reliable`]. A full queue still ends the
    /// connection, without the flush.
    pub fn close(&self, reason: String) -> Result<(), QueueError> {
        self.push(OutboundMessage::Close(reason))
    }

    /// Volatile frames dropped so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// The reliable queue overflowed and the writer was told to stop.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed)
    }

    fn push(&self, message: OutboundMessage) -> Result<(), QueueError> {
        // Once a frame is lost, later frames must not reach the peer either.
        if self.is_overflowed() {
            return Err(QueueError::Full);
        }

        match self.reliable.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.overflowed.store(true, Ordering::Relaxed);
                self.fault.notify_one();
                Err(QueueError::Full)
            },
            Err(mpsc::error::TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }
}

/// Drain the queues into `stream` until closed, detached, overflowed, or
/// failed.
///
/// The stream is flushed and shut down before returning
/// [`WriterExit::Closed`].
pub async fn run_writer<W>(stream: &mut W, mut queues: OutboundQueues) -> WriterExit
where
    W: AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            () = queues.fault.notified() => return WriterExit::Overflowed,
            message = queues.reliable.recv() => message,
            frame = queues.volatile.recv() => frame.map(OutboundMessage::Frame),
        };

        match next {
            Some(OutboundMessage::Frame(bytes)) => {
                if let Err(e) = stream.write_all(&bytes).await {
                    return WriterExit::Failed(e);
                }
            },
            Some(OutboundMessage::Close(reason)) => {
                if let Err(e) = stream.flush().await {
                    return WriterExit::Failed(e);
                }
                if let Err(e) = stream.shutdown().await {
                    return WriterExit::Failed(e);
                }
                return WriterExit::Closed(reason);
            },
            None => return WriterExit::Detached,
        }
    }
}

/// Session ID → outbound queues, and the executor for driver actions.
///
/// Every method is synchronous. Callers hold the driver lock across
/// `process_event` and [`Dispatcher::execute`], so queue order is driver
/// order.
#[derive(Debug, Default)]
pub struct Dispatcher {
    peers: HashMap<u64, OutboundHandle>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route frames for `session_id` into `handle`.
    pub fn attach(&mut self, session_id: u64, handle: OutboundHandle) {
        self.peers.insert(session_id, handle);
    }

    /// Stop routing to `session_id`. Its writer ends once the last handle is
    /// gone.
    pub fn detach(&mut self, session_id: u64) -> Option<OutboundHandle> {
        self.peers.remove(&session_id)
    }

    /// Number of attached sessions.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// No attached sessions.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Execute driver actions.
    ///
    /// Frames for sessions that are not attached are skipped.
    pub fn execute<I>(&self, actions: Vec<ServerAction<I>>) {
        for action in actions {
            match action {
                ServerAction::SendToSession { session_id, frame, delivery } => {
                    if let Some(bytes) = encode(&frame) {
                        self.deliver(session_id, bytes, delivery);
                    }
                },

                ServerAction::Broadcast { recipients, frame, delivery } => {
                    let Some(bytes) = encode(&frame) else { continue };
                    for session_id in recipients {
                        self.deliver(session_id, bytes.clone(), delivery);
                    }
                },

                ServerAction::CloseConnection { session_id, reason } => {
                    tracing::info!("Closing connection {}: {}", session_id, reason);
                    match self.peers.get(&session_id).map(|handle| handle.close(reason)) {
                        Some(Ok(()) | Err(QueueError::Full)) => {},
                        Some(Err(QueueError::Closed)) | None => {
                            unanswered(&RelayError::RecipientUnavailable(session_id));
                        },
                    }
                },

                ServerAction::Log { level, message, .. } => match level {
                    LogLevel::Debug => tracing::debug!("{}", message),
                    LogLevel::Info => tracing::info!("{}", message),
                    LogLevel::Warn => tracing::warn!("{}", message),
                    LogLevel::Error => tracing::error!("{}", message),
                },
            }
        }
    }

    /// Queue one encoded frame for a session.
    fn deliver(&self, session_id: u64, bytes: Bytes, delivery: Delivery) {
        let Some(handle) = self.peers.get(&session_id) else {
            unanswered(&RelayError::RecipientUnavailable(session_id));
            return;
        };

        match delivery {
            Delivery::Reliable => match handle.send_reliable(bytes) {
                Ok(()) => {},
                Err(QueueError::Full) => {
                    tracing::warn!(session_id, "reliable queue full, closing connection");
                },
                Err(QueueError::Closed) => {
                    unanswered(&RelayError::RecipientUnavailable(session_id));
                },
            },
            Delivery::BestEffort => {
                if !handle.send_volatile(bytes) {
                    tracing::trace!(
                        session_id,
                        dropped = handle.dropped_count(),
                        "best-effort frame dropped"
                    );
                }
            },
        }
    }
}

fn unanswered(err: &RelayError) {
    if err.is_silent() {
        tracing::debug!("{}", err);
    } else {
        tracing::warn!("{}", err);
    }
}

fn encode(frame: &Frame) -> Option<Bytes> {
    let mut buf = BytesMut::with_capacity(frame.encoded_len());
    match frame.encode(&mut buf) {
        Ok(()) => Some(buf.freeze()),
        Err(e) => {
            tracing::error!("Failed to encode outbound frame: {}", e);
            None
        },
    }
}
