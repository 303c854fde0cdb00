//! Configuration document and the typed settings views built from it.
//!
//! The store is a JSON document addressed by dotted paths
//! (`"server.port"`). A user file is merged recursively over the built-in
//! defaults; a missing or unreadable file falls back to defaults so the
//! client always starts.

mod defaults;

pub use defaults::*;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Dot-path addressable configuration document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    document: Value,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ConfigStore {
    /// A store holding only the built-in defaults.
    pub fn with_defaults() -> Self {
        Self {
            document: default_document(),
        }
    }

    /// Load a user config file and merge it over the defaults. Any failure
    /// to read or parse leaves the defaults in place.
    pub fn load(path: &Path) -> Self {
        let mut store = Self::with_defaults();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(user) => {
                    merge(&mut store.document, &user);
                    info!(path = %path.display(), "configuration loaded");
                }
                Err(err) => {
                    warn!(path = %path.display(), %err, "config file is not valid JSON; using defaults");
                }
            },
            Err(err) => {
                warn!(path = %path.display(), %err, "config file unreadable; using defaults");
            }
        }
        store
    }

    /// Write the current document to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.document)
            .context("failed to serialize configuration")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Look up a value by dotted path, e.g. `get("server.port")`.
    pub fn get(&self, dotted_path: &str) -> Option<&Value> {
        let mut current = &self.document;
        for key in dotted_path.split('.') {
            current = current.get(key)?;
        }
        Some(current)
    }

    pub fn get_u64(&self, dotted_path: &str, default: u64) -> u64 {
        self.get(dotted_path)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    pub fn get_i64(&self, dotted_path: &str, default: i64) -> i64 {
        self.get(dotted_path)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    pub fn get_str<'a>(&'a self, dotted_path: &str, default: &'a str) -> &'a str {
        self.get(dotted_path)
            .and_then(Value::as_str)
            .unwrap_or(default)
    }

    /// Set a value by dotted path, creating intermediate objects as needed.
    /// A non-object value in the middle of the path is replaced.
    pub fn set(&mut self, dotted_path: &str, value: Value) {
        let mut keys: Vec<&str> = dotted_path.split('.').collect();
        let Some(last) = keys.pop() else {
            return;
        };

        let mut current = &mut self.document;
        for key in keys {
            let slot = match current {
                Value::Object(map) => map
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => return,
            };
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = slot;
        }

        if let Value::Object(map) = current {
            map.insert(last.to_string(), value);
        }
    }
}

/// Recursively merge `update` into `base`: objects merge key-wise, anything
/// else is replaced.
fn merge(base: &mut Value, update: &Value) {
    match (base, update) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, _) => *base_slot = update.clone(),
    }
}

/// Connection parameters for one `ProtocolClient`.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub address: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl ClientSettings {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            address: store.get_str("server.address", DEFAULT_ADDRESS).to_string(),
            port: store
                .get("server.port")
                .and_then(Value::as_u64)
                .and_then(|port| u16::try_from(port).ok())
                .unwrap_or(DEFAULT_PORT),
            connect_timeout: Duration::from_millis(
                store.get_u64("server.timeout_ms", DEFAULT_CONNECT_TIMEOUT_MS),
            ),
            attempts: u32::try_from(
                store.get_u64("server.reconnect_attempts", u64::from(DEFAULT_RECONNECT_ATTEMPTS)),
            )
            .unwrap_or(DEFAULT_RECONNECT_ATTEMPTS),
            retry_delay: Duration::from_millis(
                store.get_u64("server.reconnect_delay_ms", DEFAULT_RECONNECT_DELAY_MS),
            ),
        }
    }

    /// The variant a liveness probe uses: a single bounded attempt, so the
    /// per-tick health check stays cheap.
    pub fn probe(&self, probe_timeout: Duration) -> Self {
        Self {
            address: self.address.clone(),
            port: self.port,
            connect_timeout: probe_timeout,
            attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            bail!("server.address must not be empty");
        }
        if self.port == 0 {
            bail!("server.port must not be 0");
        }
        if self.attempts == 0 {
            bail!("server.reconnect_attempts must be at least 1");
        }
        if self.connect_timeout.is_zero() {
            bail!("server.timeout_ms must be greater than 0");
        }
        Ok(())
    }
}

/// Launch/stop parameters for the supervised renderer process.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub install_dir: PathBuf,
    pub program: String,
    pub launch_grace: Duration,
    pub stop_timeout: Duration,
    pub probe_timeout: Duration,
}

impl ServiceSettings {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            install_dir: PathBuf::from(store.get_str("service.install_dir", ".")),
            program: store
                .get_str("service.program", default_program())
                .to_string(),
            launch_grace: Duration::from_millis(
                store.get_u64("service.launch_grace_ms", DEFAULT_LAUNCH_GRACE_MS),
            ),
            stop_timeout: Duration::from_millis(
                store.get_u64("service.stop_timeout_ms", DEFAULT_STOP_TIMEOUT_MS),
            ),
            probe_timeout: Duration::from_millis(
                store.get_u64("server.probe_timeout_ms", DEFAULT_PROBE_TIMEOUT_MS),
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.program.is_empty() {
            bail!("service.program must not be empty");
        }
        if self.launch_grace.is_zero() {
            bail!("service.launch_grace_ms must be greater than 0");
        }
        if self.stop_timeout.is_zero() {
            bail!("service.stop_timeout_ms must be greater than 0");
        }
        Ok(())
    }
}

/// Display defaults applied when callers omit optional message fields.
#[derive(Debug, Clone)]
pub struct OverlayDefaults {
    pub ttl: i64,
    pub color: String,
    pub size: String,
}

impl OverlayDefaults {
    pub fn from_store(store: &ConfigStore) -> Self {
        Self {
            ttl: store.get_i64("overlay.default_ttl", DEFAULT_TTL),
            color: store
                .get_str("overlay.default_color", DEFAULT_COLOR)
                .to_string(),
            size: store
                .get_str("overlay.default_size", DEFAULT_SIZE)
                .to_string(),
        }
    }
}
