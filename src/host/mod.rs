//! Plugin-host adapter glue.
//!
//! A telemetry host attaches once, ticks on every update, and detaches
//! once. This is the only layer where errors are logged and dropped: a
//! failed display update simply waits for the next tick, and detach must
//! never fail the host.


use crate::client::{ConnectionState, ProtocolClient};
use crate::config::{ClientSettings, ConfigStore, OverlayDefaults, ServiceSettings};
use crate::errors::OverlayError;
use crate::metrics::MetricsRecorder;
use crate::overlay::Overlay;
use crate::service::{HostGate, ServiceSupervisor};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

const GREETING_ID: &str = "intro";
const GREETING_TEXT: &str = "overlay link ready";
const GREETING_COLOR: &str = "green";
const GREETING_X: i64 = 30;
const GREETING_Y: i64 = 165;
const GREETING_TTL: i64 = 6;

pub struct OverlayHost {
    overlay: Overlay,
    supervisor: Arc<ServiceSupervisor>,
    metrics: Arc<MetricsRecorder>,
    extra_args: Vec<String>,
}

impl OverlayHost {
    /// Wire a complete host context from configuration: metrics, supervisor,
    /// client, facade. Settings are validated before anything connects.
    pub fn from_config(
        store: &ConfigStore,
        gate: Box<dyn HostGate>,
        extra_args: Vec<String>,
    ) -> Result<Self> {
        let client_settings = ClientSettings::from_store(store);
        client_settings
            .validate()
            .context("invalid client settings")?;
        let service_settings = ServiceSettings::from_store(store);
        service_settings
            .validate()
            .context("invalid service settings")?;

        let metrics = Arc::new(MetricsRecorder::new());
        let supervisor = Arc::new(ServiceSupervisor::with_gate(
            service_settings,
            client_settings.clone(),
            Arc::clone(&metrics),
            gate,
        ));
        let client = ProtocolClient::new(client_settings, Arc::clone(&metrics));
        let overlay = Overlay::new(client, Arc::clone(&supervisor), OverlayDefaults::from_store(store))
            .extra_args(extra_args.clone());

        Ok(Self {
            overlay,
            supervisor,
            metrics,
            extra_args,
        })
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn supervisor(&self) -> &Arc<ServiceSupervisor> {
        &self.supervisor
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Attach: bring the renderer up and announce ourselves on screen.
    pub fn start(&self) -> Result<(), OverlayError> {
        self.supervisor.ensure_running(&self.extra_args)?;
        self.overlay.send_message(
            GREETING_ID,
            GREETING_TEXT,
            GREETING_COLOR,
            GREETING_X,
            GREETING_Y,
            Some(GREETING_TTL),
            None,
        )?;
        info!("overlay host started");
        Ok(())
    }

    /// Per-update tick: cheaply re-verify liveness and re-launch when the
    /// renderer died. Failures wait for the next tick.
    pub fn on_update(&self) {
        if self.supervisor.is_alive() {
            return;
        }
        debug!("renderer not answering; attempting relaunch");
        if let Err(err) = self.supervisor.ensure_running(&self.extra_args) {
            warn!(%err, "renderer relaunch failed");
        }
    }

    /// Detach: best-effort exit handshake, then stop the process. Nothing
    /// here can fail the host. The handshake only rides an existing
    /// connection: shutdown never launches a renderer just to tell it to
    /// exit.
    pub fn stop(&self) {
        if self.overlay.connection_state() == ConnectionState::Connected {
            if let Err(err) = self.overlay.send_command("exit") {
                debug!(%err, "exit command not delivered");
            }
        }
        if let Err(err) = self.overlay.disconnect() {
            debug!(%err, "client close reported an error");
        }
        if let Err(err) = self.supervisor.stop() {
            warn!(%err, "renderer stop reported an error");
        }
        info!("overlay host stopped");
    }
}
