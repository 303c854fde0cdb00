//! Built-in configuration defaults.

use serde_json::{json, Value};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5010;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_LAUNCH_GRACE_MS: u64 = 2_000;
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_TTL: i64 = 4;
pub const DEFAULT_COLOR: &str = "white";
pub const DEFAULT_SIZE: &str = "normal";

/// Renderer binary name searched for under the install directory.
pub fn default_program() -> &'static str {
    if cfg!(windows) {
        "overlay-renderer.exe"
    } else {
        "overlay-renderer"
    }
}

/// The full default document user config files are merged over.
pub fn default_document() -> Value {
    json!({
        "server": {
            "address": DEFAULT_ADDRESS,
            "port": DEFAULT_PORT,
            "timeout_ms": DEFAULT_CONNECT_TIMEOUT_MS,
            "reconnect_attempts": DEFAULT_RECONNECT_ATTEMPTS,
            "reconnect_delay_ms": DEFAULT_RECONNECT_DELAY_MS,
            "probe_timeout_ms": DEFAULT_PROBE_TIMEOUT_MS,
        },
        "service": {
            "install_dir": ".",
            "program": default_program(),
            "launch_grace_ms": DEFAULT_LAUNCH_GRACE_MS,
            "stop_timeout_ms": DEFAULT_STOP_TIMEOUT_MS,
        },
        "overlay": {
            "default_ttl": DEFAULT_TTL,
            "default_color": DEFAULT_COLOR,
            "default_size": DEFAULT_SIZE,
        },
    })
}
