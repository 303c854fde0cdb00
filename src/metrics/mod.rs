//! In-process counters and timings for the control channel.
//!
//! Recording is fire-and-forget: every hook takes `&self`, cannot fail, and
//! never influences control flow in the client or supervisor. History is
//! bounded so a chatty caller cannot grow memory without limit.

#[cfg(test)]
mod tests;

use crate::lock_or_recover;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::warn;

const DEFAULT_MAX_HISTORY: usize = 1000;

/// Connection lifecycle events worth counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connect,
    Disconnect,
    Failure,
}

struct MessageSample {
    at: Instant,
    duration: Duration,
}

#[derive(Default)]
struct MetricsInner {
    message_history: VecDeque<MessageSample>,
    message_counts: HashMap<String, u64>,
    error_counts: HashMap<String, u64>,
    total_messages: u64,
    total_errors: u64,
    connects: u64,
    disconnects: u64,
    failures: u64,
    connect_time_total: Duration,
}

/// Thread-safe recorder shared by the client, supervisor, and facade.
pub struct MetricsRecorder {
    max_history: usize,
    started_wall: SystemTime,
    started: Instant,
    inner: Mutex<MetricsInner>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_MAX_HISTORY)
    }

    pub fn with_history(max_history: usize) -> Self {
        Self {
            max_history,
            started_wall: SystemTime::now(),
            started: Instant::now(),
            inner: Mutex::new(MetricsInner::default()),
        }
    }

    pub fn record_message_sent(&self, kind: &str, duration: Duration) {
        let mut inner = lock_or_recover(&self.inner, "metrics");
        if inner.message_history.len() >= self.max_history {
            inner.message_history.pop_front();
        }
        inner.message_history.push_back(MessageSample {
            at: Instant::now(),
            duration,
        });
        *inner.message_counts.entry(kind.to_string()).or_insert(0) += 1;
        inner.total_messages += 1;
    }

    pub fn record_connection_event(&self, event: ConnectionEvent, duration: Duration) {
        let mut inner = lock_or_recover(&self.inner, "metrics");
        match event {
            ConnectionEvent::Connect => {
                inner.connects += 1;
                inner.connect_time_total += duration;
            }
            ConnectionEvent::Disconnect => inner.disconnects += 1,
            ConnectionEvent::Failure => inner.failures += 1,
        }
    }

    pub fn record_error(&self, kind: &str) {
        let mut inner = lock_or_recover(&self.inner, "metrics");
        *inner.error_counts.entry(kind.to_string()).or_insert(0) += 1;
        inner.total_errors += 1;
        warn!(kind, "error recorded");
    }

    /// Messages per second over the trailing window.
    pub fn message_rate(&self, window: Duration) -> f64 {
        let inner = lock_or_recover(&self.inner, "metrics");
        let now = Instant::now();
        let recent = inner
            .message_history
            .iter()
            .filter(|sample| now.duration_since(sample.at) <= window)
            .count();
        if recent == 0 {
            return 0.0;
        }
        recent as f64 / window.as_secs_f64().max(1.0)
    }

    /// Mean send duration across the retained history.
    pub fn average_send_duration(&self) -> Duration {
        let inner = lock_or_recover(&self.inner, "metrics");
        let count = inner.message_history.len() as u32;
        if count == 0 {
            return Duration::ZERO;
        }
        let total: Duration = inner
            .message_history
            .iter()
            .map(|sample| sample.duration)
            .sum();
        total / count
    }

    pub fn summary(&self) -> MetricsSummary {
        let inner = lock_or_recover(&self.inner, "metrics");
        let average_connect_ms = if inner.connects == 0 {
            0.0
        } else {
            inner.connect_time_total.as_secs_f64() * 1000.0 / inner.connects as f64
        };
        MetricsSummary {
            started_unix: self
                .started_wall
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            uptime_secs: self.started.elapsed().as_secs(),
            messages: MessageStats {
                total: inner.total_messages,
                by_kind: inner.message_counts.clone(),
            },
            connections: ConnectionStats {
                connects: inner.connects,
                disconnects: inner.disconnects,
                failures: inner.failures,
                average_connect_ms,
            },
            errors: ErrorStats {
                total: inner.total_errors,
                by_kind: inner.error_counts.clone(),
            },
        }
    }

    /// Dump the current summary as pretty JSON.
    pub fn export(&self, path: &Path) -> Result<()> {
        let summary = self.summary();
        let contents =
            serde_json::to_string_pretty(&summary).context("failed to serialize metrics")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSummary {
    pub started_unix: u64,
    pub uptime_secs: u64,
    pub messages: MessageStats,
    pub connections: ConnectionStats,
    pub errors: ErrorStats,
}

#[derive(Debug, Serialize)]
pub struct MessageStats {
    pub total: u64,
    pub by_kind: HashMap<String, u64>,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStats {
    pub connects: u64,
    pub disconnects: u64,
    pub failures: u64,
    pub average_connect_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorStats {
    pub total: u64,
    pub by_kind: HashMap<String, u64>,
}
