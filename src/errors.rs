//! Error taxonomy for the overlay control channel.
//!
//! Every fallible public operation in this crate surfaces one of these
//! variants. Connect failures are retried internally up to the configured
//! attempt budget before being returned; everything else is surfaced on the
//! first occurrence so the caller decides what to do next.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    /// All connection attempts to the renderer were exhausted.
    #[error("failed to connect to {addr} after {attempts} attempts: {source}")]
    Connect {
        addr: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// An established connection broke mid-send, or no connection exists.
    /// Not retried internally; reconnect with `connect()` and resend.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The renderer executable is not present in any candidate location.
    #[error("renderer executable not found (searched {searched:?})")]
    ServiceNotFound { searched: Vec<PathBuf> },

    /// The renderer exited within the startup grace period.
    #[error("renderer exited with code {code} during startup: {diagnostics}")]
    ServiceLaunch { code: i32, diagnostics: String },

    /// The caller handed the send path something that is not a message.
    /// Raised before any I/O happens.
    #[error("invalid message: {0}")]
    Validation(&'static str),
}
