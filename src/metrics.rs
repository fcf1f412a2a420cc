//! Prometheus metrics for SSE streams.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use nix::libc;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;

use crate::error::StreamError;

/// Error reason labels for write failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    /// Client disconnected (EPIPE, ECONNRESET, BrokenPipe, ConnectionReset)
    ClientDisconnected,
    /// Write timed out
    Timeout,
    /// Network error (other network-related errors)
    Network,
    /// Diagnostic tee failed
    Tee,
    /// Other/unknown error
    Other,
}

impl ErrorReason {
    /// Convert to static string for metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::ClientDisconnected => "client_disconnected",
            ErrorReason::Timeout => "timeout",
            ErrorReason::Network => "network",
            ErrorReason::Tee => "tee",
            ErrorReason::Other => "other",
        }
    }

    /// Classify an I/O error.
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => ErrorReason::ClientDisconnected,
            io::ErrorKind::TimedOut => ErrorReason::Timeout,
            io::ErrorKind::ConnectionAborted | io::ErrorKind::NotConnected => ErrorReason::Network,
            _ => match err.raw_os_error() {
                Some(libc::EPIPE) | Some(libc::ECONNRESET) => ErrorReason::ClientDisconnected,
                Some(libc::ETIMEDOUT) => ErrorReason::Timeout,
                _ => ErrorReason::Other,
            },
        }
    }

    /// Classify a stream error. Tee failures get their own label.
    pub fn from_stream_error(err: &StreamError) -> Self {
        match err {
            StreamError::Tee(_) => ErrorReason::Tee,
            other => Self::from_io_error(other.io_error()),
        }
    }
}

/// Initialize metrics descriptions.
pub fn init_metrics() {
    describe_counter!("sse_sessions_opened_total", "SSE sessions opened");
    describe_counter!(
        "sse_session_open_errors_total",
        "SSE sessions that failed the initial header flush"
    );
    describe_counter!("sse_events_sent_total", "Events written and flushed");
    describe_counter!("sse_bytes_sent_total", "Event bytes written to clients");
    describe_counter!("sse_write_errors_total", "Event write failures");
    describe_gauge!("sse_active_streams", "Currently open event streams");
    describe_histogram!("sse_stream_duration_seconds", "Lifetime of an event stream");
}

/// Start the Prometheus metrics HTTP listener.
pub fn start_metrics_server(addr: SocketAddr) -> anyhow::Result<()> {
    // Streams are long-lived: 100ms to ~14h.
    let duration_buckets: [f64; 10] = [
        0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 1800.0, 3600.0, 50_000.0,
    ];

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("sse_stream_duration_seconds".to_string()),
            &duration_buckets,
        )?
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics server: {}", e))?;

    tracing::info!(%addr, "Metrics server started");
    Ok(())
}

pub fn record_session_opened() {
    counter!("sse_sessions_opened_total").increment(1);
}

pub fn record_session_open_error() {
    counter!("sse_session_open_errors_total").increment(1);
}

/// Record one event written to a client.
pub fn record_event_sent(bytes: u64) {
    counter!("sse_events_sent_total").increment(1);
    counter!("sse_bytes_sent_total").increment(bytes);
}

pub fn record_write_error(reason: ErrorReason) {
    counter!("sse_write_errors_total", "reason" => reason.as_str()).increment(1);
}

pub fn set_active_streams(count: u64) {
    gauge!("sse_active_streams").set(count as f64);
}

pub fn record_stream_duration(duration: std::time::Duration) {
    histogram!("sse_stream_duration_seconds").record(duration.as_secs_f64());
}

/// Timer for measuring durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
