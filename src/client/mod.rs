//! TCP control-channel client.
//!
//! One client owns one connection to the renderer. `connect()` runs a
//! bounded retry loop under the client mutex; `send_raw()` sanitizes,
//! frames, and writes a single line. Send failures are never retried here:
//! the retry budget belongs to `connect()` alone, so a caller always knows
//! whether a given message made it onto the wire.

#[cfg(test)]
mod tests;

use crate::config::ClientSettings;
use crate::errors::OverlayError;
use crate::lock_or_recover;
use crate::metrics::{ConnectionEvent, MetricsRecorder};
use crate::protocol::{message_kind, sanitize};
use serde_json::Value;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Connection lifecycle. Created `Disconnected`; `Connected` only after a
/// successful connect; back to `Disconnected` on any failure or disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct ClientInner {
    state: ConnectionState,
    stream: Option<TcpStream>,
}

pub struct ProtocolClient {
    settings: ClientSettings,
    metrics: Arc<MetricsRecorder>,
    inner: Mutex<ClientInner>,
}

impl ProtocolClient {
    pub fn new(settings: ClientSettings, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            settings,
            metrics,
            inner: Mutex::new(ClientInner {
                state: ConnectionState::Disconnected,
                stream: None,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock_or_recover(&self.inner, "client").state
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Establish the connection, retrying up to the configured attempt
    /// budget with a fixed delay between attempts.
    ///
    /// No-op when already connected. Holding the client mutex for the whole
    /// attempt sequence means concurrent callers either wait for the
    /// in-flight result or observe `Connected` immediately.
    pub fn connect(&self) -> Result<(), OverlayError> {
        let mut inner = lock_or_recover(&self.inner, "client");
        if inner.state == ConnectionState::Connected {
            return Ok(());
        }
        inner.state = ConnectionState::Connecting;
        inner.stream = None;

        let started = Instant::now();
        match self.connect_with_retry() {
            Ok(stream) => {
                inner.stream = Some(stream);
                inner.state = ConnectionState::Connected;
                self.metrics
                    .record_connection_event(ConnectionEvent::Connect, started.elapsed());
                debug!(
                    address = %self.settings.address,
                    port = self.settings.port,
                    "connected to renderer"
                );
                Ok(())
            }
            Err(err) => {
                inner.state = ConnectionState::Disconnected;
                self.metrics
                    .record_connection_event(ConnectionEvent::Failure, started.elapsed());
                self.metrics.record_error("connect");
                Err(err)
            }
        }
    }

    fn connect_with_retry(&self) -> Result<TcpStream, OverlayError> {
        let addr = format!("{}:{}", self.settings.address, self.settings.port);
        let attempts = self.settings.attempts.max(1);
        let mut last_err =
            io::Error::new(io::ErrorKind::NotConnected, "no connection attempt made");

        for attempt in 1..=attempts {
            match self.connect_once(&addr) {
                Ok(stream) => return Ok(stream),
                Err(err) => {
                    warn!(attempt, attempts, %err, "connection attempt failed");
                    last_err = err;
                    if attempt < attempts {
                        thread::sleep(self.settings.retry_delay);
                    }
                }
            }
        }

        Err(OverlayError::Connect {
            addr,
            attempts,
            source: last_err,
        })
    }

    fn connect_once(&self, addr: &str) -> io::Result<TcpStream> {
        let mut last_err: Option<io::Error> = None;
        for sock_addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&sock_addr, self.settings.connect_timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(self.settings.connect_timeout))?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "address resolved to no candidates")
        }))
    }

    /// Sanitize and transmit one message as a single newline-terminated
    /// line of compact JSON.
    ///
    /// Requires an established connection. A write failure drops the
    /// connection and surfaces `ConnectionLost`; callers reconnect with a
    /// fresh `connect()` before resending.
    pub fn send_raw(&self, raw: &Value) -> Result<(), OverlayError> {
        let Some(fields) = raw.as_object() else {
            return Err(OverlayError::Validation("message must be a JSON object"));
        };

        let mut inner = lock_or_recover(&self.inner, "client");
        if inner.state != ConnectionState::Connected {
            return Err(OverlayError::ConnectionLost(
                "no established connection".to_string(),
            ));
        }

        let cleaned = sanitize(fields);
        let kind = message_kind(&cleaned);
        let mut line = serde_json::to_string(&cleaned)
            .map_err(|_| OverlayError::Validation("message is not serializable as JSON"))?;
        line.push('\n');

        let started = Instant::now();
        let Some(mut stream) = inner.stream.take() else {
            inner.state = ConnectionState::Disconnected;
            return Err(OverlayError::ConnectionLost(
                "no established connection".to_string(),
            ));
        };
        if let Err(err) = stream.write_all(line.as_bytes()) {
            // Dropping the stream closes the socket; the caller reconnects.
            inner.state = ConnectionState::Disconnected;
            self.metrics.record_error("send");
            return Err(OverlayError::ConnectionLost(err.to_string()));
        }
        inner.stream = Some(stream);

        self.metrics.record_message_sent(kind, started.elapsed());
        Ok(())
    }

    /// Close the connection. Idempotent: the client always ends up
    /// `Disconnected`. The close error, if any, is handed back for the
    /// caller to log or ignore.
    pub fn disconnect(&self) -> io::Result<()> {
        let mut inner = lock_or_recover(&self.inner, "client");
        inner.state = ConnectionState::Disconnected;
        match inner.stream.take() {
            Some(stream) => {
                self.metrics
                    .record_connection_event(ConnectionEvent::Disconnect, Duration::ZERO);
                stream.shutdown(Shutdown::Both)
            }
            None => Ok(()),
        }
    }
}
