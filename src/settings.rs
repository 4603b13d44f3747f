//! Client settings.
//!
//! Layers, lowest first:
//!
//! 1. built-in defaults
//! 2. optional TOML file (`--config`)
//! 3. environment, prefix `COLONY`, `__` between nested keys
//!
//! | Key              | Env                      | Default                 |
//! |------------------|--------------------------|-------------------------|
//! | `origin`         | `COLONY_ORIGIN`          | `http://localhost:8080` |
//! | `room`           | `COLONY_ROOM`            | `lobby`                 |
//! | `retry_delay_ms` | `COLONY_RETRY_DELAY_MS`  | `3000`                  |
//! | `event_buffer`   | `COLONY_EVENT_BUFFER`    | `1024`                  |
//! | `view.cell_size` | `COLONY_VIEW__CELL_SIZE` | `20`                    |
//! | `view.gap`       | `COLONY_VIEW__GAP`       | `2`                     |
//! | `view.padding`   | `COLONY_VIEW__PADDING`   | `10`                    |
//! | `view.flash_ms`  | `COLONY_VIEW__FLASH_MS`  | `200`                   |
//!
//! Command-line flags are applied over the result by the binary.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::DEFAULT_ROOM;
use crate::transport::{TransportConfig, DEFAULT_EVENT_BUFFER, DEFAULT_RETRY_DELAY};
use crate::types::ViewConfig;

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";
pub const ENV_PREFIX: &str = "COLONY";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Origin of the page the viewer belongs to; the socket lives on its host.
    pub origin: String,
    pub room: String,
    pub retry_delay_ms: u64,
    pub event_buffer: usize,
    pub view: ViewConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            room: DEFAULT_ROOM.to_string(),
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            event_buffer: DEFAULT_EVENT_BUFFER,
            view: ViewConfig::default(),
        }
    }
}

impl ClientSettings {
    /// Load defaults, then `path` (if it exists), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn transport_config(&self, address: impl Into<String>) -> TransportConfig {
        TransportConfig {
            address: address.into(),
            retry_delay: self.retry_delay(),
            event_buffer: self.event_buffer.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let s = ClientSettings::default();
        assert_eq!(s.origin, "http://localhost:8080");
        assert_eq!(s.room, "lobby");
        assert_eq!(s.retry_delay(), Duration::from_millis(3000));
        assert_eq!(s.event_buffer, 1024);
        assert_eq!(s.view.cell_size, 20);
        assert_eq!(s.view.flash_ms, 200);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = ClientSettings::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(s.view, ViewConfig::default());
        assert_eq!(s.retry_delay_ms, 3000);
    }

    #[test]
    fn file_overrides_selected_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "room = \"alpha\"\nretry_delay_ms = 500\n\n[view]\ncell_size = 32"
        )
        .unwrap();

        let s = ClientSettings::load(Some(&path)).unwrap();
        assert_eq!(s.room, "alpha");
        assert_eq!(s.retry_delay(), Duration::from_millis(500));
        assert_eq!(s.view.cell_size, 32);
        assert_eq!(s.view.gap, 2);
        assert_eq!(s.origin, DEFAULT_ORIGIN);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "retry_delay_ms = \"soon\"").unwrap();
        assert!(matches!(
            ClientSettings::load(Some(&path)),
            Err(SettingsError::Load(_))
        ));
    }

    #[test]
    fn transport_config_carries_delay_and_buffer() {
        let s = ClientSettings {
            retry_delay_ms: 250,
            event_buffer: 0,
            ..Default::default()
        };
        let cfg = s.transport_config("ws://h/ws?room=lobby");
        assert_eq!(cfg.retry_delay, Duration::from_millis(250));
        assert_eq!(cfg.event_buffer, 1);
    }
}
