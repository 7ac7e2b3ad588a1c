// Stream monitoring HTTP route
//
// Operational visibility: which sessions are live, how old they are, how
// many streams opened today, and a coarse health signal an on-call person
// can alert on.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use beacon_core::keys::{
    counter_key, session_id_from_marker_key, INBOX_PREFIX, MARKER_PREFIX,
};
use beacon_core::session::MarkerPayload;
use beacon_core::traits::RelayStore;
use beacon_store::SessionChannel;

/// App state for monitor routes
#[derive(Clone)]
pub struct AppState {
    pub channel: SessionChannel,
}

/// Create monitor routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/streams", get(stream_overview))
        .with_state(state)
}

/// One active session as seen in the relay store
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDetail {
    pub session_id: String,
    pub marker_key: String,
    /// Remaining marker TTL; `None` when the probe failed
    pub ttl_secs: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub age_secs: Option<i64>,
    /// Whether the marker payload parsed
    pub readable: bool,
}

/// Coarse health signal
#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthSignal {
    Ok,
    /// More inbox keys than markers: consumers are dying without teardown
    Orphaned,
    /// More active sessions than the warning threshold
    Busy,
}

/// Monitoring snapshot
#[derive(Debug, Serialize, ToSchema)]
pub struct StreamOverview {
    pub active_sessions: usize,
    pub inbox_keys: usize,
    /// Sessions opened today, from the daily rollup counter
    pub sessions_today: i64,
    pub health: HealthSignal,
    pub sessions: Vec<SessionDetail>,
}

/// GET /v1/streams - Snapshot of active push sessions
#[utoipa::path(
    get,
    path = "/v1/streams",
    responses(
        (status = 200, description = "Monitoring snapshot", body = StreamOverview),
        (status = 500, description = "Relay store unavailable")
    ),
    tag = "streams"
)]
pub async fn stream_overview(
    State(state): State<AppState>,
) -> Result<Json<StreamOverview>, StatusCode> {
    let store = state.channel.store();

    let marker_keys = store.keys(MARKER_PREFIX).await.map_err(|e| {
        tracing::error!("Failed to list markers: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let inbox_keys = store.keys(INBOX_PREFIX).await.map_err(|e| {
        tracing::error!("Failed to list inboxes: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut sessions = Vec::with_capacity(marker_keys.len());
    for key in &marker_keys {
        let Some(session_id) = session_id_from_marker_key(key) else {
            continue;
        };
        // per-key probe failures degrade the row, not the whole snapshot
        let ttl_secs = store.ttl_secs(key).await.ok().flatten();
        let payload = match store.get(key).await {
            Ok(Some(raw)) => MarkerPayload::decode(&raw).ok(),
            _ => None,
        };
        sessions.push(SessionDetail {
            session_id: session_id.to_string(),
            marker_key: key.clone(),
            ttl_secs,
            created_at: payload.as_ref().map(|p| p.created_at),
            age_secs: payload.as_ref().map(|p| p.age_secs()),
            readable: payload.is_some(),
        });
    }

    let sessions_today = match store.get(&counter_key(Utc::now().date_naive())).await {
        Ok(Some(raw)) => raw.parse().unwrap_or(0),
        _ => 0,
    };

    let active_sessions = sessions.len();
    let health = if inbox_keys.len() > marker_keys.len() {
        HealthSignal::Orphaned
    } else if active_sessions > state.channel.config().active_session_warning {
        HealthSignal::Busy
    } else {
        HealthSignal::Ok
    };

    Ok(Json(StreamOverview {
        active_sessions,
        inbox_keys: inbox_keys.len(),
        sessions_today,
        health,
        sessions,
    }))
}
