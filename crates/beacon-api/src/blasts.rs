// Blast trigger HTTP route
//
// Accepts a batch of messages and hands it to the in-process runner. The
// response returns immediately with the session id; progress flows over
// the session's SSE stream.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use beacon_worker::{BlastRunner, OutboundSms, ReceiverGonePolicy};

/// App state for blast routes
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<BlastRunner>,
}

/// Create blast routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/blasts", post(start_blast))
        .with_state(state)
}

/// One message in a blast request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BlastMessage {
    /// Destination number, E.164
    #[schema(example = "+16125550100")]
    pub to: String,
    #[schema(example = "Volunteer shift tomorrow at 9am")]
    pub body: String,
}

/// What to do with the rest of a batch once nobody is watching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlastPolicy {
    #[default]
    ContinueSending,
    StopSending,
}

impl From<BlastPolicy> for ReceiverGonePolicy {
    fn from(policy: BlastPolicy) -> Self {
        match policy {
            BlastPolicy::ContinueSending => ReceiverGonePolicy::ContinueSending,
            BlastPolicy::StopSending => ReceiverGonePolicy::StopSending,
        }
    }
}

/// Request to start a blast
#[derive(Debug, Deserialize, ToSchema)]
pub struct StartBlastRequest {
    /// Session to report progress on. Generated when omitted; subscribe
    /// to `/v1/streams/{session_id}/sse` with it either way.
    #[serde(default)]
    pub session_id: Option<String>,
    pub messages: Vec<BlastMessage>,
    #[serde(default)]
    pub policy: BlastPolicy,
}

/// Response to a started blast
#[derive(Debug, Serialize, ToSchema)]
pub struct StartBlastResponse {
    pub session_id: String,
}

/// POST /v1/blasts - Start a bulk send
#[utoipa::path(
    post,
    path = "/v1/blasts",
    request_body = StartBlastRequest,
    responses(
        (status = 202, description = "Blast started", body = StartBlastResponse),
        (status = 400, description = "Empty batch"),
        (status = 409, description = "A blast is already running for this session"),
        (status = 500, description = "Internal server error")
    ),
    tag = "blasts"
)]
pub async fn start_blast(
    State(state): State<AppState>,
    Json(req): Json<StartBlastRequest>,
) -> Result<(StatusCode, Json<StartBlastResponse>), StatusCode> {
    if req.messages.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let session_id = req
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if state.runner.is_running(&session_id).await {
        return Err(StatusCode::CONFLICT);
    }

    let messages = req
        .messages
        .into_iter()
        .map(|m| OutboundSms {
            to: m.to,
            body: m.body,
        })
        .collect();

    state
        .runner
        .start_blast(session_id.clone(), messages, req.policy.into())
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, "Failed to start blast: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((StatusCode::ACCEPTED, Json(StartBlastResponse { session_id })))
}
