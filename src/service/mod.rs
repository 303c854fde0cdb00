//! Renderer process supervision.
//!
//! The supervisor owns the external renderer: it discovers the executable,
//! launches it with captured output, infers liveness by round-tripping a
//! probe message through a short-lived client, and terminates it on
//! shutdown. Liveness is judged purely by the TCP listener answering; there
//! is no process-table inspection and no background watchdog, so external
//! exits are noticed the next time someone asks.


use crate::client::ProtocolClient;
use crate::config::{ClientSettings, ServiceSettings};
use crate::errors::OverlayError;
use crate::lock_or_recover;
use crate::metrics::MetricsRecorder;
use crate::protocol::probe_message;
use crossbeam_channel::{bounded, Receiver, TrySendError};
use serde_json::Value;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lines of child output retained per stream for launch diagnostics.
const CAPTURE_BUFFER_LINES: usize = 256;

/// Poll interval while waiting for the child to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Host-level precondition for running the renderer at all. When the gate
/// reports inactive, `ensure_running` is a guaranteed no-op: the service has
/// no reason to exist without the thing it renders over.
pub trait HostGate: Send + Sync {
    fn is_active(&self) -> bool;
}

/// Gate for hosts that are always worth rendering for.
pub struct AlwaysActive;

impl HostGate for AlwaysActive {
    fn is_active(&self) -> bool {
        true
    }
}

/// Where the supervised process is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    /// Handle exists, liveness unconfirmed.
    Starting,
    Running,
    /// The process went away on its own; noticed lazily.
    Exited,
    Stopped,
    /// Exited inside the launch grace period.
    Failed,
}

struct SupervisedProcess {
    child: Child,
    stdout_rx: Receiver<String>,
    stderr_rx: Receiver<String>,
}

impl SupervisedProcess {
    /// Spawn the renderer with its working directory set to the directory
    /// the executable lives in, stdout/stderr piped into capture threads.
    fn spawn(program: &Path, extra_args: &[String]) -> io::Result<Self> {
        let workdir = program.parent().unwrap_or_else(|| Path::new("."));
        let mut child = Command::new(program)
            .args(extra_args)
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout_rx = spawn_line_capture(child.stdout.take());
        let stderr_rx = spawn_line_capture(child.stderr.take());
        Ok(Self {
            child,
            stdout_rx,
            stderr_rx,
        })
    }

    /// Collect whatever the child wrote, stderr first since that is where
    /// launch failures explain themselves. The short receive timeout lets
    /// the capture threads flush pipes that just hit EOF.
    fn drain_diagnostics(&self) -> String {
        let mut lines = Vec::new();
        while let Ok(line) = self.stderr_rx.recv_timeout(Duration::from_millis(50)) {
            lines.push(line);
        }
        while let Ok(line) = self.stdout_rx.recv_timeout(Duration::from_millis(50)) {
            lines.push(line);
        }
        lines.join("\n")
    }

    /// Graceful termination: SIGTERM, bounded wait, SIGKILL as a last
    /// resort. The child is always reaped before returning.
    fn shutdown(mut self, timeout: Duration) -> io::Result<()> {
        #[cfg(unix)]
        {
            let pid = self.child.id() as libc::pid_t;
            // SAFETY: pid names the child this handle owns; SIGTERM only
            // requests termination.
            let ret = unsafe { libc::kill(pid, libc::SIGTERM) };
            if ret != 0 {
                debug!(
                    pid,
                    err = %io::Error::last_os_error(),
                    "SIGTERM to renderer failed"
                );
            }
        }
        if wait_for_exit(&mut self.child, timeout) {
            return Ok(());
        }
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

/// Forward one captured stream line-by-line into a bounded channel. When
/// the channel is full the line is dropped but the pipe keeps draining, so
/// a chatty child never blocks on a full pipe buffer.
fn spawn_line_capture<R: Read + Send + 'static>(source: Option<R>) -> Receiver<String> {
    let (tx, rx) = bounded(CAPTURE_BUFFER_LINES);
    if let Some(source) = source {
        thread::spawn(move || {
            let reader = BufReader::new(source);
            for line in reader.lines() {
                let Ok(line) = line else {
                    break;
                };
                match tx.try_send(line) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        });
    }
    rx
}

/// Poll until the child exits or the timeout lapses. Returns whether the
/// child was reaped.
fn wait_for_exit(child: &mut Child, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(err) => {
                debug!(%err, "try_wait on renderer failed");
                return true;
            }
        }
        if start.elapsed() >= timeout {
            return false;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

struct SupervisorInner {
    process: Option<SupervisedProcess>,
    program_path: Option<PathBuf>,
    state: ProcessState,
}

/// Owns the renderer process handle. `ensure_running`, `stop`, and
/// `is_alive` are serialized by the supervisor mutex so launch and stop
/// never race.
pub struct ServiceSupervisor {
    settings: ServiceSettings,
    client_settings: ClientSettings,
    gate: Box<dyn HostGate>,
    metrics: Arc<MetricsRecorder>,
    inner: Mutex<SupervisorInner>,
}

impl ServiceSupervisor {
    pub fn new(
        settings: ServiceSettings,
        client_settings: ClientSettings,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self::with_gate(settings, client_settings, metrics, Box::new(AlwaysActive))
    }

    pub fn with_gate(
        settings: ServiceSettings,
        client_settings: ClientSettings,
        metrics: Arc<MetricsRecorder>,
        gate: Box<dyn HostGate>,
    ) -> Self {
        Self {
            settings,
            client_settings,
            gate,
            metrics,
            inner: Mutex::new(SupervisorInner {
                process: None,
                program_path: None,
                state: ProcessState::NotStarted,
            }),
        }
    }

    pub fn process_state(&self) -> ProcessState {
        lock_or_recover(&self.inner, "supervisor").state
    }

    /// Locate the renderer executable, caching the first hit permanently.
    /// The candidate set is static, so a later disappearance of the cached
    /// path surfaces as a launch failure rather than a re-search.
    pub fn find_executable(&self) -> Result<PathBuf, OverlayError> {
        let mut inner = lock_or_recover(&self.inner, "supervisor");
        self.locate(&mut inner)
    }

    fn locate(&self, inner: &mut SupervisorInner) -> Result<PathBuf, OverlayError> {
        if let Some(path) = &inner.program_path {
            return Ok(path.clone());
        }
        let candidates = self.candidates();
        for candidate in &candidates {
            if candidate.is_file() {
                info!(path = %candidate.display(), "renderer executable found");
                inner.program_path = Some(candidate.clone());
                return Ok(candidate.clone());
            }
        }
        Err(OverlayError::ServiceNotFound {
            searched: candidates,
        })
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let dir = &self.settings.install_dir;
        let program = &self.settings.program;
        vec![
            dir.join(program),
            dir.join("renderer").join(program),
            dir.join("renderer").join("bin").join("release").join(program),
            dir.join("renderer").join("bin").join("debug").join(program),
        ]
    }

    /// Best-effort liveness: connect, round-trip the reserved probe
    /// message, disconnect. Every error means "not alive".
    pub fn is_alive(&self) -> bool {
        let _guard = lock_or_recover(&self.inner, "supervisor");
        self.probe_alive()
    }

    fn probe_alive(&self) -> bool {
        let probe = ProtocolClient::new(
            self.client_settings.probe(self.settings.probe_timeout),
            Arc::clone(&self.metrics),
        );
        let alive =
            probe.connect().is_ok() && probe.send_raw(&Value::Object(probe_message())).is_ok();
        if let Err(err) = probe.disconnect() {
            debug!(%err, "probe disconnect failed");
        }
        alive
    }

    /// Make sure a renderer is up, launching one if needed.
    ///
    /// No-op while the host gate is inactive. Success means a handle in
    /// `Running` state; whether the socket is accepting connections yet is
    /// the next probe's or `connect()`'s concern.
    pub fn ensure_running(&self, extra_args: &[String]) -> Result<(), OverlayError> {
        if !self.gate.is_active() {
            debug!("host inactive; not launching renderer");
            return Ok(());
        }

        let mut inner = lock_or_recover(&self.inner, "supervisor");
        if self.probe_alive() {
            inner.state = ProcessState::Running;
            return Ok(());
        }

        if let Some(process) = inner.process.as_mut() {
            match process.child.try_wait() {
                Ok(Some(status)) => {
                    info!(%status, "renderer exited; clearing stale handle");
                    inner.process = None;
                    inner.state = ProcessState::Exited;
                }
                Ok(None) => {
                    // Alive but not answering yet; give it more time.
                    return Ok(());
                }
                Err(err) => {
                    warn!(%err, "cannot poll renderer; clearing handle");
                    inner.process = None;
                    inner.state = ProcessState::Exited;
                }
            }
        }

        let program = self.locate(&mut inner)?;
        info!(program = %program.display(), ?extra_args, "launching renderer");
        let mut process =
            SupervisedProcess::spawn(&program, extra_args).map_err(|err| {
                self.metrics.record_error("launch");
                OverlayError::ServiceLaunch {
                    code: -1,
                    diagnostics: format!("failed to start {}: {err}", program.display()),
                }
            })?;
        inner.state = ProcessState::Starting;

        thread::sleep(self.settings.launch_grace);

        match process.child.try_wait() {
            Ok(Some(status)) => {
                let diagnostics = process.drain_diagnostics();
                inner.state = ProcessState::Failed;
                self.metrics.record_error("launch");
                Err(OverlayError::ServiceLaunch {
                    code: status.code().unwrap_or(-1),
                    diagnostics,
                })
            }
            Ok(None) => {
                inner.process = Some(process);
                inner.state = ProcessState::Running;
                Ok(())
            }
            Err(err) => {
                warn!(%err, "cannot poll freshly launched renderer; assuming it is up");
                inner.process = Some(process);
                inner.state = ProcessState::Running;
                Ok(())
            }
        }
    }

    /// Terminate the renderer if one was launched. The handle is cleared no
    /// matter what; the termination error is handed back for the caller to
    /// log or ignore, because shutdown must never fail.
    pub fn stop(&self) -> io::Result<()> {
        let mut inner = lock_or_recover(&self.inner, "supervisor");
        let Some(process) = inner.process.take() else {
            return Ok(());
        };
        inner.state = ProcessState::Stopped;
        let result = process.shutdown(self.settings.stop_timeout);
        if let Err(err) = &result {
            warn!(%err, "renderer did not stop cleanly");
        }
        result
    }
}
