//! `WorldView` – reconciles decoded messages against the local model and its
//! rendered surface, and turns tile activations into outbound commands.
//!
//! ## Flow
//!
//! ```text
//! TransportEvent ──► handle_transport()
//!                      Connecting    → drop conn, status = connecting
//!                      Opened(conn)  → keep conn, status = open
//!                      Frame(text)   → handle_frame()
//!                                        decode → init   → model.apply_init + surface.rebuild
//!                                                 update → model.apply_update + surface patches
//!                                                 echo / unknown / malformed → event log
//!                      Closed        → drop conn, status = closed
//!
//! click_tile(x, y) ──► only while open ──► encode_command ──► conn.send
//! ```
//!
//! Everything runs on one thread and each call finishes before the next
//! begins, so no reader ever sees a half-applied message.

pub mod event_log;
pub mod model;
pub mod surface;

use std::time::Instant;

use crate::protocol::{self, CommandPayload, InitPayload, ServerMessage, UpdatePayload};
use crate::transport::{Connection, ConnectionState, TransportEvent, DEFAULT_RETRY_DELAY};
use crate::types::{TileCoord, ViewConfig};

pub use event_log::{EntryKind, EventLog, LogEntry};
pub use model::{ModelChanges, WorldModel};
pub use surface::{EntityElement, EntityPatch, RenderSurface, SurfaceSnapshot, TileElement};

/// What became of a tile activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Exactly one `cmd` frame was queued.
    Sent,
    /// Not connected; the activation was dropped.
    NotConnected,
    /// No tile element exists at that coordinate.
    UnknownTile,
}

/// What a handled event did to the rendered surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// Nothing visible changed (status, diagnostics, empty patches).
    Nothing,
    /// The surface was rebuilt from a snapshot.
    Reset,
    /// Some elements were patched in place.
    Patched,
}

pub struct WorldView {
    model: WorldModel,
    surface: RenderSurface,
    log: EventLog,
    status: ConnectionState,
    connection: Option<Connection>,
    retry_delay_ms: u128,
}

impl WorldView {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            model: WorldModel::new(),
            surface: RenderSurface::new(config.layout(), config.flash()),
            log: EventLog::new(),
            status: ConnectionState::Connecting,
            connection: None,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis(),
        }
    }

    /// Retry delay quoted in the "closed" log line.
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = u128::from(ms);
        self
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Apply one transport event.
    pub fn handle_transport(&mut self, event: TransportEvent, now: Instant) -> Reconciled {
        match event {
            TransportEvent::Connecting { address, attempt } => {
                self.connection = None;
                self.status = ConnectionState::Connecting;
                let text = if attempt > 1 {
                    format!("Connecting to {} (attempt {})...", address, attempt)
                } else {
                    format!("Connecting to {}...", address)
                };
                self.log.push(EntryKind::Status, text);
                Reconciled::Nothing
            }

            TransportEvent::Opened(connection) => {
                self.log.push(
                    EntryKind::Status,
                    format!(
                        "Connection established (generation {}).",
                        connection.generation()
                    ),
                );
                self.connection = Some(connection);
                self.status = ConnectionState::Open;
                Reconciled::Nothing
            }

            TransportEvent::Frame(raw) => self.handle_frame(&raw, now),

            TransportEvent::Closed { reason } => {
                self.connection = None;
                self.status = ConnectionState::Closed;
                self.log.push(
                    EntryKind::Status,
                    format!(
                        "Connection closed ({}). Retrying in {}s...",
                        reason,
                        self.retry_delay_ms as f64 / 1000.0
                    ),
                );
                Reconciled::Nothing
            }
        }
    }

    /// Decode and reconcile one raw frame. Never fails: anything that does
    /// not decode becomes a single diagnostic log entry.
    pub fn handle_frame(&mut self, raw: &str, now: Instant) -> Reconciled {
        match protocol::decode(raw) {
            Ok(ServerMessage::Init(payload)) => self.apply_init(payload),
            Ok(ServerMessage::Update(payload)) => self.apply_update(&payload, now),
            Ok(ServerMessage::Echo(payload)) => {
                self.log.push(EntryKind::Echo, format!("RX: {}", payload));
                Reconciled::Nothing
            }
            Ok(ServerMessage::Unknown { kind, .. }) => {
                self.log
                    .push(EntryKind::Unrecognized, format!("RX ({}): {}", kind, raw));
                Reconciled::Nothing
            }
            Err(e) => {
                log::debug!("[view] {}", e);
                self.log.push(EntryKind::Malformed, format!("RX: {}", e.raw()));
                Reconciled::Nothing
            }
        }
    }

    fn apply_init(&mut self, payload: InitPayload) -> Reconciled {
        // Build the next model and surface aside, then swap both in together.
        let mut model = WorldModel::new();
        model.apply_init(payload);
        let mut surface = self.surface.clone();
        surface.rebuild(&model);
        self.model = model;
        self.surface = surface;

        let (width, height) = self.model.dimensions().unwrap_or((0, 0));
        self.log.push(
            EntryKind::Status,
            format!(
                "World loaded{}: {}x{}, {} tiles, {} entities.",
                self.model
                    .room_id()
                    .map(|r| format!(" (room {})", r))
                    .unwrap_or_default(),
                width,
                height,
                self.model.tile_count(),
                self.model.entity_count()
            ),
        );
        Reconciled::Reset
    }

    fn apply_update(&mut self, payload: &UpdatePayload, now: Instant) -> Reconciled {
        let changes = self.model.apply_update(payload);

        for (coord, terrain) in &changes.tiles {
            self.surface.patch_tile(*coord, *terrain, now);
        }
        for id in changes.spawned.iter().chain(changes.updated.iter()) {
            if let Some(entity) = self.model.entity(id) {
                if self.surface.upsert_entity(entity) == EntityPatch::Created {
                    log::debug!("[view] entity {} first seen", id);
                }
            }
        }

        if changes.is_empty() {
            Reconciled::Nothing
        } else {
            Reconciled::Patched
        }
    }

    /// Revert highlights whose interval has elapsed.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.surface.expire_flashes(now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.surface.next_flash_deadline()
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    /// Activate the tile at `(x, y)`.
    ///
    /// Sends one `click` command while the connection is open; otherwise the
    /// activation is silently dropped. Nothing is queued for later.
    pub fn click_tile(&mut self, x: u32, y: u32) -> ClickOutcome {
        let connection = match (&self.connection, self.status) {
            (Some(conn), ConnectionState::Open) => conn,
            _ => return ClickOutcome::NotConnected,
        };

        let coord = TileCoord::new(x, y);
        if self.surface.tile(coord).is_none() {
            return ClickOutcome::UnknownTile;
        }

        let frame = protocol::encode_command(&CommandPayload::click(x, y));
        match connection.send(frame) {
            Ok(()) => {
                self.log
                    .push(EntryKind::Command, format!("TX: click {}", coord));
                ClickOutcome::Sent
            }
            Err(e) => {
                log::debug!("[view] dropping click on {}: {}", coord, e);
                ClickOutcome::NotConnected
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn model(&self) -> &WorldModel {
        &self.model
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn status(&self) -> ConnectionState {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionState::Open && self.connection.is_some()
    }

    /// Text of the connection indicator.
    pub fn status_text(&self) -> &'static str {
        match self.status {
            ConnectionState::Open => "Connected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Closed => "Disconnected",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
