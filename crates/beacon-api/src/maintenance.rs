// Cleanup trigger HTTP route
//
// Cron (or a human) POSTs here; the sweep itself lives with the store
// layer. Safe to invoke repeatedly and alongside live traffic.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use std::sync::Arc;

use beacon_store::{Reaper, SweepReport};

/// App state for maintenance routes
#[derive(Clone)]
pub struct AppState {
    pub reaper: Arc<Reaper>,
}

/// Create maintenance routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/maintenance/sweep", post(run_sweep))
        .with_state(state)
}

/// POST /v1/maintenance/sweep - Remove orphaned and lapsed sessions
#[utoipa::path(
    post,
    path = "/v1/maintenance/sweep",
    responses(
        (status = 200, description = "Sweep finished", body = SweepReport),
        (status = 500, description = "Relay store unavailable")
    ),
    tag = "maintenance"
)]
pub async fn run_sweep(State(state): State<AppState>) -> Result<Json<SweepReport>, StatusCode> {
    let report = state.reaper.sweep().await.map_err(|e| {
        tracing::error!("Sweep failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(report))
}
