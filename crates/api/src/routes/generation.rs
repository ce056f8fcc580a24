//! Route definitions for the generation pipeline.
//!
//! ```text
//! POST   /                     submit_generation
//! GET    /                     list_generations
//! GET    /{id}                 get_generation
//! POST   /{id}/cancel          cancel_generation
//! GET    /{id}/asset           get_generation_asset
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes nested under `/api/v1/generations`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(generation::submit_generation).get(generation::list_generations),
        )
        .route("/{id}", get(generation::get_generation))
        .route("/{id}/cancel", post(generation::cancel_generation))
        .route("/{id}/asset", get(generation::get_generation_asset))
}
