// Stream subscribe HTTP route (SSE)
//
// Holds one browser connection open and forwards one session's events as
// they appear. The inbox is polled on a fixed short interval; each drain
// is bounded to less than one tick so a slow store cannot stall the loop.
//
// Lifecycle per connection:
// - subscribe: create/refresh the marker, emit `connected`
// - poll: drain, forward in order, collapse exact repeats within a batch
// - terminal event: delete both keys, end the stream
// - disconnect: drop guard deletes both keys best-effort
// - duration ceiling: end the stream; the reaper covers whatever teardown
//   this path skipped

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use futures::stream::{self, Stream, StreamExt};
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use beacon_core::event::PushEvent;
use beacon_store::SessionChannel;

/// App state for stream routes
#[derive(Clone)]
pub struct AppState {
    pub channel: SessionChannel,
}

/// Create stream routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/streams/:session_id/sse", get(stream_sse))
        .with_state(state)
}

/// GET /v1/streams/{session_id}/sse - Subscribe to a session's events
///
/// The first event is always `{"type":"connected"}`; the stream ends after
/// forwarding `{"type":"complete",...}`, on client disconnect, or at the
/// connection duration ceiling.
#[utoipa::path(
    get,
    path = "/v1/streams/{session_id}/sse",
    params(
        ("session_id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 400, description = "Blank session id"),
        (status = 500, description = "Relay store unavailable")
    ),
    tag = "streams"
)]
pub async fn stream_sse(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let session_id = session_id.trim().to_string();
    if session_id.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    state.channel.open(&session_id).await.map_err(|e| {
        tracing::error!(session_id = %session_id, "Failed to open session: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!(session_id = %session_id, "Starting event stream");

    let stream = session_stream(state.channel.clone(), session_id)
        .map(|raw| Ok::<_, Infallible>(SseEvent::default().data(raw)));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    ))
}

enum Phase {
    Greeting,
    Polling,
    Done,
}

struct PollState {
    channel: SessionChannel,
    session_id: String,
    deadline: Instant,
    next_touch: Instant,
    phase: Phase,
    guard: Arc<DisconnectGuard>,
}

/// Stream of encoded events for one session. Ends after the terminal
/// event or the duration ceiling; dropping it mid-flight (client
/// disconnect) triggers the guard's best-effort cleanup.
fn session_stream(channel: SessionChannel, session_id: String) -> impl Stream<Item = String> {
    let config = channel.config().clone();
    let guard = Arc::new(DisconnectGuard::new(channel.clone(), session_id.clone()));
    let state = PollState {
        channel,
        session_id,
        deadline: Instant::now() + config.max_stream_duration,
        next_touch: Instant::now() + config.marker_ttl / 2,
        phase: Phase::Greeting,
        guard,
    };

    stream::unfold(state, |mut state| async move {
        match state.phase {
            Phase::Greeting => {
                state.phase = Phase::Polling;
                Some((stream::iter(vec![PushEvent::Connected.encode()]), state))
            }
            Phase::Polling => {
                let config = state.channel.config().clone();
                tokio::time::sleep(config.poll_interval).await;

                if Instant::now() >= state.deadline {
                    // the hosting runtime may have cut the response before
                    // this fires; either way the reaper covers teardown
                    info!(session_id = %state.session_id, "stream hit duration ceiling");
                    return None;
                }

                if Instant::now() >= state.next_touch {
                    state.next_touch = Instant::now() + config.marker_ttl / 2;
                    if let Err(e) = state.channel.touch(&state.session_id).await {
                        warn!(session_id = %state.session_id, error = %e, "marker refresh failed");
                    }
                }

                let batch = state.poll_once().await;
                Some((stream::iter(batch), state))
            }
            Phase::Done => None,
        }
    })
    .flatten()
}

impl PollState {
    /// One poll tick: drain, collapse exact repeats, forward in order.
    /// A failed or overrunning read is an empty tick, never a stream end.
    async fn poll_once(&mut self) -> Vec<String> {
        let config = self.channel.config();
        let events = match tokio::time::timeout(
            config.read_budget(),
            self.channel.drain(&self.session_id),
        )
        .await
        {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                warn!(session_id = %self.session_id, error = %e, "inbox read failed, empty tick");
                return Vec::new();
            }
            Err(_) => {
                warn!(session_id = %self.session_id, "inbox read overran its budget");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut batch = Vec::new();
        for event in events {
            let raw = event.encode();
            if !seen.insert(raw.clone()) {
                continue;
            }
            let terminal = event.is_terminal();
            batch.push(raw);
            if terminal {
                if let Err(e) = self.channel.close(&self.session_id).await {
                    debug!(session_id = %self.session_id, error = %e, "post-complete cleanup failed");
                }
                self.guard.disarm();
                self.phase = Phase::Done;
                break;
            }
        }
        batch
    }
}

/// Deletes the session keys when the response is dropped before the
/// terminal event - client went away, or the runtime ended the response
struct DisconnectGuard {
    channel: SessionChannel,
    session_id: String,
    armed: AtomicBool,
}

impl DisconnectGuard {
    fn new(channel: SessionChannel, session_id: String) -> Self {
        Self {
            channel,
            session_id,
            armed: AtomicBool::new(true),
        }
    }

    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.armed.load(Ordering::SeqCst) {
            return;
        }
        let channel = self.channel.clone();
        let session_id = self.session_id.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                info!(session_id = %session_id, "subscriber went away, removing session keys");
                if let Err(e) = channel.close(&session_id).await {
                    debug!(session_id = %session_id, error = %e, "disconnect cleanup failed");
                }
            });
        }
    }
}
