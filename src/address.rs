//! Endpoint derivation.
//!
//! The viewer is served from a page origin (`http://host:port`) and talks to
//! `ws://host:port/ws?room=<room>` on the same host. A secure origin maps to a
//! secure socket.
//!
//! | origin scheme   | socket scheme |
//! |-----------------|---------------|
//! | `http`, `ws`    | `ws`          |
//! | `https`, `wss`  | `wss`         |

use thiserror::Error;
use url::Url;

/// Room joined when none is named.
pub const DEFAULT_ROOM: &str = "lobby";

/// Path of the socket endpoint on the origin host.
pub const SOCKET_PATH: &str = "/ws";

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },
    #[error("unsupported origin scheme '{0}' (expected http, https, ws or wss)")]
    UnsupportedScheme(String),
}

/// Build the socket URL for `room` on the host serving `origin`.
///
/// Any path, query or fragment on `origin` is discarded. An empty `room`
/// falls back to [`DEFAULT_ROOM`].
pub fn endpoint_url(origin: &str, room: &str) -> Result<Url, AddressError> {
    let parsed = Url::parse(origin).map_err(|e| AddressError::InvalidOrigin {
        origin: origin.to_string(),
        reason: e.to_string(),
    })?;

    let scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(AddressError::UnsupportedScheme(other.to_string())),
    };

    let host = parsed
        .host_str()
        .ok_or_else(|| AddressError::InvalidOrigin {
            origin: origin.to_string(),
            reason: "missing host".into(),
        })?;
    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut url = Url::parse(&format!("{}://{}{}", scheme, authority, SOCKET_PATH)).map_err(
        |e| AddressError::InvalidOrigin {
            origin: origin.to_string(),
            reason: e.to_string(),
        },
    )?;
    url.query_pairs_mut().append_pair("room", effective_room(room));
    Ok(url)
}

/// Room named by a page query string (`?room=alpha&x=1`), or the default.
///
/// A leading `?` is accepted. A missing or empty `room` gives
/// [`DEFAULT_ROOM`].
pub fn room_from_query(query: &str) -> String {
    let query = query.strip_prefix('?').unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "room")
        .map(|(_, value)| effective_room(&value).to_string())
        .unwrap_or_else(|| DEFAULT_ROOM.to_string())
}

fn effective_room(room: &str) -> &str {
    let room = room.trim();
    if room.is_empty() {
        DEFAULT_ROOM
    } else {
        room
    }
}
