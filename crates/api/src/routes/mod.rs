pub mod generation;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generations                       submit (POST), list (GET)
/// /generations/{id}                  get status
/// /generations/{id}/cancel           cancel (POST)
/// /generations/{id}/asset            materialized asset (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/generations", generation::router())
}
