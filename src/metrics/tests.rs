use super::{ConnectionEvent, MetricsRecorder};
use std::time::Duration;

#[test]
fn message_counts_accumulate_by_kind() {
    let metrics = MetricsRecorder::new();
    metrics.record_message_sent("text", Duration::from_millis(2));
    metrics.record_message_sent("text", Duration::from_millis(4));
    metrics.record_message_sent("shape", Duration::from_millis(6));

    let summary = metrics.summary();
    assert_eq!(summary.messages.total, 3);
    assert_eq!(summary.messages.by_kind["text"], 2);
    assert_eq!(summary.messages.by_kind["shape"], 1);
}

#[test]
fn connection_events_are_tallied() {
    let metrics = MetricsRecorder::new();
    metrics.record_connection_event(ConnectionEvent::Connect, Duration::from_millis(10));
    metrics.record_connection_event(ConnectionEvent::Connect, Duration::from_millis(30));
    metrics.record_connection_event(ConnectionEvent::Disconnect, Duration::ZERO);
    metrics.record_connection_event(ConnectionEvent::Failure, Duration::ZERO);

    let summary = metrics.summary();
    assert_eq!(summary.connections.connects, 2);
    assert_eq!(summary.connections.disconnects, 1);
    assert_eq!(summary.connections.failures, 1);
    assert!((summary.connections.average_connect_ms - 20.0).abs() < 1.0);
}

#[test]
fn errors_are_tallied_by_kind() {
    let metrics = MetricsRecorder::new();
    metrics.record_error("connect");
    metrics.record_error("connect");
    metrics.record_error("send");

    let summary = metrics.summary();
    assert_eq!(summary.errors.total, 3);
    assert_eq!(summary.errors.by_kind["connect"], 2);
    assert_eq!(summary.errors.by_kind["send"], 1);
}

#[test]
fn history_is_bounded() {
    let metrics = MetricsRecorder::with_history(4);
    for _ in 0..20 {
        metrics.record_message_sent("text", Duration::from_millis(1));
    }
    // Totals keep counting even after old samples fall off.
    assert_eq!(metrics.summary().messages.total, 20);
    assert_eq!(metrics.average_send_duration(), Duration::from_millis(1));
}

#[test]
fn rate_is_zero_without_recent_messages() {
    let metrics = MetricsRecorder::new();
    assert_eq!(metrics.message_rate(Duration::from_secs(1)), 0.0);
    metrics.record_message_sent("text", Duration::ZERO);
    assert!(metrics.message_rate(Duration::from_secs(60)) > 0.0);
}

#[test]
fn export_writes_valid_json() {
    let metrics = MetricsRecorder::new();
    metrics.record_message_sent("text", Duration::from_millis(3));
    metrics.record_error("send");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    metrics.export(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed["messages"]["total"], 1);
    assert_eq!(parsed["errors"]["by_kind"]["send"], 1);
}
