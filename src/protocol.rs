//! Room wire protocol.
//!
//! This module owns **every message that crosses the socket boundary**
//! between a room server and this client.
//!
//! ## Message kinds
//!
//! | `type`   | Direction        | Payload             |
//! |----------|------------------|---------------------|
//! | `init`   | server → client  | [`InitPayload`]     |
//! | `update` | server → client  | [`UpdatePayload`]   |
//! | `echo`   | server → client  | any JSON value      |
//! | `cmd`    | client → server  | [`CommandPayload`]  |
//!
//! ## Design rules
//!
//! 1. Every frame is a JSON object `{ "type": …, "payload": … }`.
//! 2. Unknown `type` values decode to [`ServerMessage::Unknown`]; they are
//!    never rejected.
//! 3. A frame that is not JSON, or has no string `type`, is a
//!    [`ProtocolError::MalformedFrame`] carrying the raw text so callers can
//!    surface it as a diagnostic.
//! 4. Terrain travels as an integer code; grass tiles may omit it.

use crate::types::{Activity, Inventory, Terrain, TileCoord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Message kinds
// ---------------------------------------------------------------------------

/// All `type` tags used by the room protocol, as constants.
pub mod kinds {
    pub const INIT: &str = "init";
    pub const UPDATE: &str = "update";
    pub const ECHO: &str = "echo";
    pub const CMD: &str = "cmd";
}

/// Action name carried by a tile activation command.
pub const CLICK_ACTION: &str = "click";

/// Largest grid side accepted in an `init`. Bigger snapshots are malformed.
pub const MAX_GRID_SIDE: u32 = 4096;

// ---------------------------------------------------------------------------
// Element shapes
// ---------------------------------------------------------------------------

/// One tile as it appears in `init` and `update` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileState {
    pub x: u32,
    pub y: u32,
    /// Omitted on the wire for grass.
    #[serde(rename = "type", default)]
    pub terrain: Terrain,
}

/// Tile deltas share the snapshot shape.
pub type TileDelta = TileState;

impl TileState {
    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.x, self.y)
    }
}

/// One entity as it appears in `init` and `update` payloads.
///
/// `id` is assigned by the server and stays stable for the entity's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: String,
    pub x: u32,
    pub y: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Inventory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Activity>,
}

/// Entity deltas share the snapshot shape; absent optional fields mean
/// "unchanged".
pub type EntityDelta = EntityState;

impl EntityState {
    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Full world snapshot. Replaces everything the client knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub tiles: Vec<TileState>,
    #[serde(default)]
    pub entities: Vec<EntityState>,
    /// Colony stockpile (e.g. `wood`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<BTreeMap<String, i64>>,
}

/// Partial patch. An absent field means "no change to that category".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<TileDelta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<EntityDelta>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<BTreeMap<String, i64>>,
}

impl UpdatePayload {
    pub fn is_empty(&self) -> bool {
        self.tiles.as_ref().map_or(true, Vec::is_empty)
            && self.entities.as_ref().map_or(true, Vec::is_empty)
            && self.resources.is_none()
    }
}

/// Outbound player action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub action: String,
    pub x: u32,
    pub y: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
}

impl CommandPayload {
    /// Tile activation at `(x, y)`.
    pub fn click(x: u32, y: u32) -> Self {
        Self {
            action: CLICK_ACTION.into(),
            x,
            y,
            params: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoded messages
// ---------------------------------------------------------------------------

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Init(InitPayload),
    Update(UpdatePayload),
    /// Diagnostic passthrough, opaque to the model.
    Echo(serde_json::Value),
    /// Any `type` this client does not understand.
    Unknown {
        kind: String,
        payload: serde_json::Value,
    },
}

impl ServerMessage {
    /// The `type` tag this message arrived with.
    pub fn kind(&self) -> &str {
        match self {
            ServerMessage::Init(_) => kinds::INIT,
            ServerMessage::Update(_) => kinds::UPDATE,
            ServerMessage::Echo(_) => kinds::ECHO,
            ServerMessage::Unknown { kind, .. } => kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not JSON, lacks a string `type`, or its payload does not
    /// match the declared kind. `raw` is the frame text as received.
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String, raw: String },
}

impl ProtocolError {
    fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        ProtocolError::MalformedFrame {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    /// The undecodable frame text.
    pub fn raw(&self) -> &str {
        match self {
            ProtocolError::MalformedFrame { raw, .. } => raw,
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Decode one inbound text frame.
pub fn decode(raw: &str) -> Result<ServerMessage, ProtocolError> {
    let v: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ProtocolError::malformed(e.to_string(), raw))?;

    let kind = v
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| ProtocolError::malformed("missing string `type` field", raw))?;

    let payload = v.get("payload").cloned().unwrap_or(serde_json::Value::Null);

    match kind {
        kinds::INIT => {
            let init: InitPayload = serde_json::from_value(payload)
                .map_err(|e| ProtocolError::malformed(format!("bad init payload: {}", e), raw))?;
            if init.width > MAX_GRID_SIDE || init.height > MAX_GRID_SIDE {
                return Err(ProtocolError::malformed(
                    format!(
                        "grid {}x{} exceeds {}x{}",
                        init.width, init.height, MAX_GRID_SIDE, MAX_GRID_SIDE
                    ),
                    raw,
                ));
            }
            Ok(ServerMessage::Init(init))
        }
        kinds::UPDATE => {
            if payload.is_null() {
                return Ok(ServerMessage::Update(UpdatePayload::default()));
            }
            serde_json::from_value(payload)
                .map(ServerMessage::Update)
                .map_err(|e| ProtocolError::malformed(format!("bad update payload: {}", e), raw))
        }
        kinds::ECHO => Ok(ServerMessage::Echo(payload)),
        other => Ok(ServerMessage::Unknown {
            kind: other.to_string(),
            payload,
        }),
    }
}

/// Encode an outbound command frame: `{"type":"cmd","payload":{…}}`.
pub fn encode_command(cmd: &CommandPayload) -> String {
    let mut payload = serde_json::json!({
        "action": cmd.action,
        "x": cmd.x,
        "y": cmd.y,
    });
    if let Some(params) = &cmd.params {
        payload["params"] = serde_json::Value::String(params.clone());
    }
    serde_json::json!({ "type": kinds::CMD, "payload": payload }).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ---------------------------------------------------------------
    // Inbound
    // ---------------------------------------------------------------

    #[test]
    fn oversized_init_is_malformed() {
        let raw = r#"{"type":"init","payload":{"width":4000000000,"height":1,"tiles":[]}}"#;
        let err = decode(raw).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert_eq!(err.raw(), raw);

        let edge = json!({ "type": "init", "payload": { "width": MAX_GRID_SIDE, "height": 1 } });
        assert!(matches!(decode(&edge.to_string()), Ok(ServerMessage::Init(_))));
    }

    #[test]
    fn decodes_init_with_tiles_and_entities() {
        let raw = r#"{"type":"init","payload":{"room_id":"alpha","width":2,"height":1,
            "tiles":[{"x":0,"y":0,"type":1},{"x":1,"y":0}],
            "entities":[{"id":"g1","x":1,"y":0,"inventory":{"wood":2}}]}}"#;
        let ServerMessage::Init(init) = decode(raw).unwrap() else {
            panic!("expected init");
        };
        assert_eq!(init.room_id.as_deref(), Some("alpha"));
        assert_eq!((init.width, init.height), (2, 1));
        assert_eq!(init.tiles[0].terrain, Terrain::Water);
        // `type` omitted => grass
        assert_eq!(init.tiles[1].terrain, Terrain::Grass);
        assert_eq!(init.entities[0].inventory.unwrap().wood, 2);
        assert_eq!(init.entities[0].state, None);
    }

    #[test]
    fn init_without_entities_defaults_to_empty() {
        let raw = r#"{"type":"init","payload":{"width":1,"height":1,"tiles":[{"x":0,"y":0,"type":4}]}}"#;
        let ServerMessage::Init(init) = decode(raw).unwrap() else {
            panic!("expected init");
        };
        assert!(init.entities.is_empty());
        assert!(init.resources.is_none());
    }

    #[test]
    fn decodes_partial_update() {
        let raw = r#"{"type":"update","payload":{"entities":[{"id":"g1","x":3,"y":4,"state":1}]}}"#;
        let ServerMessage::Update(up) = decode(raw).unwrap() else {
            panic!("expected update");
        };
        assert!(up.tiles.is_none());
        let ents = up.entities.unwrap();
        assert_eq!(ents[0].coord(), TileCoord::new(3, 4));
        assert_eq!(ents[0].state, Some(Activity::Moving));
    }

    #[test]
    fn update_without_payload_is_empty_patch() {
        let msg = decode(r#"{"type":"update"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Update(UpdatePayload::default()));
        if let ServerMessage::Update(up) = msg {
            assert!(up.is_empty());
        }
    }

    #[test]
    fn echo_is_opaque() {
        let msg = decode(r#"{"type":"echo","payload":{"anything":[1,2,3]}}"#).unwrap();
        assert_eq!(msg, ServerMessage::Echo(json!({"anything": [1, 2, 3]})));
        assert_eq!(msg.kind(), "echo");
    }

    #[test]
    fn unknown_type_passes_through() {
        let msg = decode(r#"{"type":"weather","payload":"rain"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Unknown {
                kind: "weather".into(),
                payload: json!("rain"),
            }
        );
    }

    // ---------------------------------------------------------------
    // Malformed input
    // ---------------------------------------------------------------

    #[test]
    fn non_json_is_malformed_and_keeps_raw() {
        let err = decode("Hello from the server!").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { .. }));
        assert_eq!(err.raw(), "Hello from the server!");
    }

    #[test]
    fn missing_type_is_malformed() {
        assert!(decode(r#"{"payload":{}}"#).is_err());
        assert!(decode(r#"{"type":7,"payload":{}}"#).is_err());
        assert!(decode("[1,2]").is_err());
    }

    #[test]
    fn init_with_wrong_shape_is_malformed() {
        let err = decode(r#"{"type":"init","payload":{"width":"wide"}}"#).unwrap_err();
        assert!(err.to_string().contains("bad init payload"));
    }

    // ---------------------------------------------------------------
    // Outbound
    // ---------------------------------------------------------------

    #[test]
    fn click_command_has_cmd_envelope() {
        let frame = encode_command(&CommandPayload::click(4, 2));
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            v,
            json!({"type": "cmd", "payload": {"action": "click", "x": 4, "y": 2}})
        );
    }

    #[test]
    fn command_params_included_only_when_present() {
        let mut cmd = CommandPayload::click(0, 0);
        cmd.params = Some("plant".into());
        let v: serde_json::Value = serde_json::from_str(&encode_command(&cmd)).unwrap();
        assert_eq!(v["payload"]["params"], "plant");
    }
}
