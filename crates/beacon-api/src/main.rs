// Beacon API server
// Decision: the SSE consumer, the blast trigger and the cleanup sweep live
// in one process; the relay store is the only coordination point between
// them, so any of the three can be split out later without code changes

mod blasts;
mod maintenance;
mod monitor;
mod streams;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use beacon_core::config::StreamConfig;
use beacon_store::{create_store, Reaper, SessionChannel, StoreConfig};
use beacon_worker::{create_dispatcher, BlastRunner, DispatcherConfig};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store_mode: String,
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    store_mode: String,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store_mode: state.store_mode.clone(),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        streams::stream_sse,
        monitor::stream_overview,
        blasts::start_blast,
        maintenance::run_sweep,
    ),
    components(
        schemas(
            beacon_core::PushEvent,
            beacon_core::MarkerPayload,
            beacon_store::SweepReport,
            monitor::StreamOverview,
            monitor::SessionDetail,
            monitor::HealthSignal,
            blasts::BlastMessage,
            blasts::BlastPolicy,
            blasts::StartBlastRequest,
            blasts::StartBlastResponse,
        )
    ),
    tags(
        (name = "streams", description = "Session subscribe and monitoring endpoints (SSE)"),
        (name = "blasts", description = "Bulk send endpoints"),
        (name = "maintenance", description = "Relay cleanup endpoints")
    ),
    info(
        title = "Beacon API",
        version = "0.2.0",
        description = "Push-update channel for long-running bulk sends",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("beacon-api starting...");

    // Connect the relay store
    let store_config = StoreConfig::from_env()?;
    tracing::info!(mode = ?store_config.mode, "Relay store configured");
    let store = create_store(&store_config)
        .await
        .context("Failed to connect to relay store")?;

    let stream_config = StreamConfig::default();
    let channel = SessionChannel::new(store.clone(), stream_config.clone());

    // Configure the SMS provider (sandbox when no provider is set)
    let dispatcher = create_dispatcher(&DispatcherConfig::from_env())
        .context("Failed to configure SMS provider")?;
    let runner = Arc::new(BlastRunner::new(channel.clone(), dispatcher));
    let reaper = Arc::new(Reaper::new(store, stream_config));

    // Create module-specific states
    let streams_state = streams::AppState {
        channel: channel.clone(),
    };
    let monitor_state = monitor::AppState { channel };
    let blasts_state = blasts::AppState { runner };
    let maintenance_state = maintenance::AppState { reaper };
    let health_state = HealthState {
        store_mode: format!("{:?}", store_config.mode),
    };

    // Load API prefix from environment (default: empty)
    // Example: API_PREFIX="/api" results in routes like /api/v1/streams
    let api_prefix = std::env::var("API_PREFIX").unwrap_or_default();
    if !api_prefix.is_empty() {
        tracing::info!(prefix = %api_prefix, "API prefix configured");
    }

    // Load CORS allowed origins from environment (optional)
    // Only needed when the dashboard is served from a different origin
    let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect()
        })
        .unwrap_or_default();

    if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
    }

    // Build API routes
    let api_routes = Router::new()
        .merge(streams::routes(streams_state))
        .merge(monitor::routes(monitor_state))
        .merge(blasts::routes(blasts_state))
        .merge(maintenance::routes(maintenance_state));

    // Build main router with health (not prefixed) and prefixed API routes
    let mut app = Router::new().route("/health", get(health).with_state(health_state));
    app = app.merge(build_router_with_prefix(api_routes, &api_prefix));

    // Add Swagger UI
    let app =
        app.merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // Add CORS layer only if origins are configured
    let app = if !cors_origins.is_empty() {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::ORIGIN,
                    header::CACHE_CONTROL,
                ]),
        )
    } else {
        app
    };

    // Add tracing
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let port = std::env::var("PORT").unwrap_or_else(|_| "9000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Build router with optional API prefix (extracted for testing)
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}
