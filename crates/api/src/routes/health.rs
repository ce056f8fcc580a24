use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Readiness summary for the service and its two hard dependencies: the
/// database and the provider registry.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `"ok"` when both dependencies are usable, `"degraded"` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database answered a liveness query.
    pub db_healthy: bool,
    /// Registered provider adapter ids, in routing order.
    pub providers: Vec<&'static str>,
}

/// GET /health -- service, database, and provider registry health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = fabula_db::health_check(&state.pool).await.is_ok();
    let providers = state.providers.provider_ids();

    // A pipeline with no registered providers can accept work but never
    // dispatch it, so an empty registry also degrades the service.
    let status = if db_healthy && !providers.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        providers,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
