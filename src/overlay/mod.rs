//! The overlay facade: the one object surrounding code talks to.
//!
//! Every send follows the same ensure-then-send pattern: when the client is
//! not connected, make sure the renderer is up, connect, then transmit.
//! Errors surface unmodified with no retries beyond the connect budget, so
//! the caller always knows whether a specific message went out.


use crate::client::{ConnectionState, ProtocolClient};
use crate::config::OverlayDefaults;
use crate::errors::OverlayError;
use crate::protocol::{command_message, ShapeMessage, TextMessage};
use crate::service::ServiceSupervisor;
use serde_json::{Map, Value};
use std::io;
use std::sync::Arc;
use tracing::debug;

pub struct Overlay {
    client: ProtocolClient,
    supervisor: Arc<ServiceSupervisor>,
    defaults: OverlayDefaults,
    extra_args: Vec<String>,
}

impl Overlay {
    pub fn new(
        client: ProtocolClient,
        supervisor: Arc<ServiceSupervisor>,
        defaults: OverlayDefaults,
    ) -> Self {
        Self {
            client,
            supervisor,
            defaults,
            extra_args: Vec::new(),
        }
    }

    /// Arguments handed to the renderer whenever this facade launches it.
    pub fn extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Display a text label. `ttl` and `size` fall back to the configured
    /// defaults when `None`.
    pub fn send_message(
        &self,
        id: &str,
        text: &str,
        color: &str,
        x: i64,
        y: i64,
        ttl: Option<i64>,
        size: Option<&str>,
    ) -> Result<(), OverlayError> {
        let message = TextMessage::new(id, text, color, x, y)
            .ttl(ttl.unwrap_or(self.defaults.ttl))
            .size(size.unwrap_or(&self.defaults.size));
        self.send_fields(message.fields())
    }

    /// Display a geometric shape.
    #[allow(clippy::too_many_arguments)]
    pub fn send_shape(
        &self,
        id: &str,
        shape: &str,
        color: &str,
        fill: &str,
        x: i64,
        y: i64,
        w: i64,
        h: i64,
        ttl: i64,
    ) -> Result<(), OverlayError> {
        let message = ShapeMessage::new(id, shape, color, fill, x, y, w, h, ttl);
        self.send_fields(message.fields())
    }

    /// Send a bare command. Used for the `exit` handshake at shutdown.
    pub fn send_command(&self, command: &str) -> Result<(), OverlayError> {
        self.send_fields(command_message(command))
    }

    fn send_fields(&self, fields: Map<String, Value>) -> Result<(), OverlayError> {
        self.ensure_connected()?;
        self.client.send_raw(&Value::Object(fields))
    }

    fn ensure_connected(&self) -> Result<(), OverlayError> {
        if self.client.state() == ConnectionState::Connected {
            return Ok(());
        }
        debug!("no live connection; ensuring renderer and reconnecting");
        self.supervisor.ensure_running(&self.extra_args)?;
        self.client.connect()
    }

    /// Best-effort close of the client connection.
    pub fn disconnect(&self) -> io::Result<()> {
        self.client.disconnect()
    }
}
