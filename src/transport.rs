//! Transport manager – owns the single live connection and its reconnects.
//!
//! ## Lifecycle
//!
//! ```text
//! TransportManager::run()
//!   loop
//!     Connecting { address, attempt }   ← state = connecting
//!     connector.connect(address)
//!       ok  → Opened(Connection)         ← state = open
//!             Frame(text) …              (strict arrival order)
//!             Closed { reason }          ← state = closed
//!       err → Closed { reason }          ← state = closed
//!     sleep(retry_delay)                 (exactly one pending attempt)
//! ```
//!
//! Server close, network loss and handshake failure all end in the same
//! `Closed` event; there is no separate error channel. The delay is fixed:
//! no backoff, no reset. The loop ends only when the owner drops its
//! [`TransportHandle`].
//!
//! Events travel over a bounded channel. When the owner falls behind the
//! manager waits; frames are never dropped or reordered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Delay between a close and the next connection attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(3000);

/// Default depth of the event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("connection lost: {0}")]
    Lost(String),
    #[error("connection is closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Connection handle
// ---------------------------------------------------------------------------

/// Sending side of one live connection.
///
/// A fresh `Connection` is handed out on every open; it is never reused.
/// Once its connection closes, [`Connection::send`] fails.
#[derive(Debug, Clone)]
pub struct Connection {
    generation: u64,
    address: String,
    outbound: mpsc::UnboundedSender<String>,
}

impl Connection {
    pub fn new(generation: u64, address: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                generation,
                address: address.into(),
                outbound: tx,
            },
            rx,
        )
    }

    /// Queue one text frame for the server.
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    /// Monotonic counter; the first successful open is generation 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_live(&self) -> bool {
        !self.outbound.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Events (manager → owner)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A connection attempt is starting.
    Connecting { address: String, attempt: u64 },
    /// The attempt succeeded. The owner should keep this handle for sending.
    Opened(Connection),
    /// One complete text frame from the server.
    Frame(String),
    /// The connection (or the attempt) ended. A retry is already scheduled.
    Closed { reason: String },
}

// ---------------------------------------------------------------------------
// Connector seam
// ---------------------------------------------------------------------------

/// One established, bidirectional text-frame link.
///
/// `next_frame` must be cancel-safe: the manager polls it inside `select!`.
#[async_trait]
pub trait FrameLink: Send {
    /// Next text frame; `None` once the peer has closed the link.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;
    async fn send_frame(&mut self, frame: String) -> Result<(), TransportError>;
    async fn close(&mut self);
}

/// Opens [`FrameLink`]s to an address.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Box<dyn FrameLink>, TransportError>;
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Full endpoint URL (e.g. `ws://localhost:8080/ws?room=lobby`).
    pub address: String,
    /// Fixed delay before every reconnection attempt.
    pub retry_delay: Duration,
    /// Depth of the event channel before the manager waits on the owner.
    pub event_buffer: usize,
}

impl TransportConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            retry_delay: DEFAULT_RETRY_DELAY,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle (owned by the view side)
// ---------------------------------------------------------------------------

/// Returned by [`TransportManager::new`]. Dropping it stops the manager.
pub struct TransportHandle {
    pub events: mpsc::Receiver<TransportEvent>,
    pub state: watch::Receiver<ConnectionState>,
}

impl TransportHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// How a live connection ended.
enum LinkEnd {
    Lost(String),
    OwnerGone,
}

pub struct TransportManager<C> {
    config: TransportConfig,
    connector: C,
    events: mpsc::Sender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    attempts: u64,
    generation: u64,
}

impl<C: Connector> TransportManager<C> {
    pub fn new(config: TransportConfig, connector: C) -> (Self, TransportHandle) {
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        (
            Self {
                config,
                connector,
                events: event_tx,
                state: state_tx,
                attempts: 0,
                generation: 0,
            },
            TransportHandle {
                events: event_rx,
                state: state_rx,
            },
        )
    }

    /// Connect, pump, and reconnect until the owner drops its handle.
    pub async fn run(mut self) {
        loop {
            self.attempts += 1;
            self.set_state(ConnectionState::Connecting);
            let connecting = TransportEvent::Connecting {
                address: self.config.address.clone(),
                attempt: self.attempts,
            };
            if self.emit(connecting).await.is_err() {
                break;
            }

            log::info!(
                "[transport] connecting to {} (attempt {})",
                self.config.address,
                self.attempts
            );

            let reason = match self.connector.connect(&self.config.address).await {
                Ok(link) => match self.serve(link).await {
                    LinkEnd::Lost(reason) => reason,
                    LinkEnd::OwnerGone => break,
                },
                Err(e) => e.to_string(),
            };

            log::warn!(
                "[transport] closed: {} – retrying in {} ms",
                reason,
                self.config.retry_delay.as_millis()
            );
            self.set_state(ConnectionState::Closed);
            if self.emit(TransportEvent::Closed { reason }).await.is_err() {
                break;
            }

            tokio::time::sleep(self.config.retry_delay).await;
        }

        self.set_state(ConnectionState::Closed);
        log::info!("[transport] owner gone – manager stopped");
    }

    /// Drive one open link until it ends.
    async fn serve(&mut self, mut link: Box<dyn FrameLink>) -> LinkEnd {
        self.generation += 1;
        let (connection, mut outbound) = Connection::new(self.generation, &self.config.address);

        self.set_state(ConnectionState::Open);
        log::info!("[transport] open (generation {})", self.generation);
        if self.emit(TransportEvent::Opened(connection)).await.is_err() {
            link.close().await;
            return LinkEnd::OwnerGone;
        }

        // Once every Connection clone is dropped there is nothing left to send,
        // but inbound frames keep flowing.
        let mut outbound_open = true;

        loop {
            tokio::select! {
                frame = link.next_frame() => match frame {
                    Some(Ok(text)) => {
                        if self.emit(TransportEvent::Frame(text)).await.is_err() {
                            link.close().await;
                            return LinkEnd::OwnerGone;
                        }
                    }
                    Some(Err(e)) => return LinkEnd::Lost(e.to_string()),
                    None => return LinkEnd::Lost("closed by server".into()),
                },
                out = outbound.recv(), if outbound_open => match out {
                    Some(text) => {
                        if let Err(e) = link.send_frame(text).await {
                            return LinkEnd::Lost(e.to_string());
                        }
                    }
                    None => outbound_open = false,
                },
                _ = self.events.closed() => {
                    link.close().await;
                    return LinkEnd::OwnerGone;
                }
            }
        }
    }

    async fn emit(&self, event: TransportEvent) -> Result<(), TransportError> {
        self.events.send(event).await.map_err(|_| TransportError::Closed)
    }

    fn set_state(&self, state: ConnectionState) {
        // send_replace never fails, even with no receivers left.
        self.state.send_replace(state);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
