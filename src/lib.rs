//! Colony Client
//!
//! A live viewer for a remote grid-world room. The server owns the
//! simulation; this crate mirrors its state locally, renders it, and sends
//! tile activations back.
//!
//! ## Architecture
//!
//! ```text
//! TransportManager  (transport.rs)  ← one live connection, fixed-delay reconnect
//!   ├── WsConnector  (ws.rs)        ← tokio-tungstenite, `client` feature
//!   └── TransportEvent ──mpsc──►
//!         WorldView  (view/)        ← single-threaded reconciliation
//!           ├── protocol::decode    (protocol.rs)
//!           ├── WorldModel          (view/model.rs)
//!           ├── RenderSurface       (view/surface.rs)
//!           └── EventLog            (view/event_log.rs)
//! ```
//!
//! `address` derives the socket URL from a page origin and room, `settings`
//! loads layered configuration and `input` parses console commands for the
//! `colony-client` binary.

// Protocol, model and view are always available (no client feature needed).
pub mod address;
pub mod input;
pub mod protocol;
pub mod settings;
pub mod transport;
pub mod types;
pub mod view;

// WebSocket connector requires the `client` feature.
#[cfg(feature = "client")]
pub mod ws;

pub use address::{endpoint_url, room_from_query, AddressError, DEFAULT_ROOM};
pub use input::{InputError, UserCommand};
pub use protocol::{
    decode, encode_command, CommandPayload, ProtocolError, ServerMessage, TileDelta, TileState,
};
pub use settings::{ClientSettings, SettingsError};
pub use transport::{
    Connection, ConnectionState, Connector, FrameLink, TransportConfig, TransportError,
    TransportEvent, TransportHandle, TransportManager,
};
pub use types::{Activity, Inventory, Layout, Terrain, TileCoord, ViewConfig};
pub use view::{ClickOutcome, EntryKind, EventLog, RenderSurface, WorldModel, WorldView};
#[cfg(feature = "client")]
pub use ws::WsConnector;
