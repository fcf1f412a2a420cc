//! HTTP routes: the `/events` stream and a health check.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use super::ticker::Ticker;
use crate::config::StreamConfig;
use crate::eventlog;
use crate::metrics::{self, Timer};
use crate::shutdown::{ShutdownCoordinator, StreamGuard};
use crate::streaming::{body, ResponseSink, StreamSession, TeeResponse};

/// Shared state for all requests.
pub struct AppState {
    pub stream: StreamConfig,
    /// Frames queued per stream before writes wait on the client.
    pub channel_capacity: usize,
    /// Tee every stream into the event log, printed by this printer.
    pub event_log: Option<eventlog::Printer>,
    pub shutdown: ShutdownCoordinator,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events", get(events))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// GET /events
///
/// The session runs in its own task over a channel-backed body; the handler
/// only waits for the committed head and returns it.
async fn events(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let request = http::Request::from_parts(parts, ());

    let (body, pending) = body::channel(state.channel_capacity);
    let sink: Box<dyn ResponseSink> = match &state.event_log {
        Some(printer) => {
            let printer = printer.clone();
            let (pipe, _reader) = eventlog::spawn(move |lines| printer(lines));
            Box::new(TeeResponse::new(body, pipe))
        }
        None => Box::new(body),
    };

    let guard = state.shutdown.register_stream();
    let span = tracing::info_span!("stream", id = guard.id(), version = ?request.version());
    tokio::spawn(run_stream(state, sink, request, guard).instrument(span));

    match pending.wait().await {
        Some(response) => response,
        None => (StatusCode::INTERNAL_SERVER_ERROR, "event stream failed to open").into_response(),
    }
}

async fn run_stream(
    state: Arc<AppState>,
    sink: Box<dyn ResponseSink>,
    request: http::Request<()>,
    guard: StreamGuard,
) {
    let timer = Timer::new();

    let mut session = match StreamSession::open(sink, &request).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to open event stream");
            return;
        }
    };
    tracing::debug!("Event stream opened");

    let ticker = Ticker::from_config(&state.stream);
    let max_events = state.stream.max_events;
    let mut interval = tokio::time::interval(state.stream.interval().max(MIN_INTERVAL));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sent = 0u64;
    let reason = loop {
        tokio::select! {
            biased;

            _ = guard.signaled() => {
                break "shutdown";
            }

            _ = interval.tick() => {
                if let Err(e) = session.write_event(Some(ticker.event(sent + 1))).await {
                    tracing::debug!(error = %e, sent, "Event write failed");
                    break "write_failed";
                }
                sent += 1;
                if max_events != 0 && sent >= max_events {
                    break "complete";
                }
            }
        }
    };

    metrics::record_stream_duration(timer.elapsed());
    tracing::info!(
        sent,
        reason,
        duration_ms = timer.elapsed().as_millis() as u64,
        "Event stream closed"
    );
}

const MIN_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);
