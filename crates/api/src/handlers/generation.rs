//! Handlers for the generation pipeline.
//!
//! Routes:
//! - `POST /api/v1/generations`             — submit a generation request
//! - `GET  /api/v1/generations`             — list generations
//! - `GET  /api/v1/generations/{id}`        — generation status
//! - `POST /api/v1/generations/{id}/cancel` — cancel a generation
//! - `GET  /api/v1/generations/{id}/asset`  — the materialized asset

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use fabula_core::hashing::SeedStrategy;
use fabula_core::social::{ContextCeiling, SocialContext};
use fabula_core::types::{DbId, Timestamp};
use fabula_core::CoreError;
use fabula_db::models::generation::{Generation, GenerationListQuery};
use fabula_db::models::status::GenerationStatus;
use fabula_db::repositories::{AssetRepo, GenerationRepo};
use fabula_pipeline::intake::{self, IntakeRequest};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

/// Caller-facing seed selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SeedSpec {
    /// Caller-supplied seed; fully deterministic.
    Fixed { value: i64 },
    /// Seed derived from a stable per-playthrough identifier.
    Playthrough { playthrough_id: String },
    /// Explicitly non-deterministic; opts out of deduplication.
    Timestamp,
}

impl From<SeedSpec> for SeedStrategy {
    fn from(spec: SeedSpec) -> Self {
        match spec {
            SeedSpec::Fixed { value } => SeedStrategy::Fixed(value),
            SeedSpec::Playthrough { playthrough_id } => SeedStrategy::Playthrough(playthrough_id),
            SeedSpec::Timestamp => SeedStrategy::Timestamp,
        }
    }
}

/// Request body for `POST /generations`.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitGenerationRequest {
    /// Canonical operation kind string (e.g. `video_extend`).
    #[validate(length(min = 1, max = 64))]
    pub kind: String,
    /// Provider-styled structured parameters.
    pub params: serde_json::Value,
    /// Opaque input references (asset ids or URLs).
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Defaults to [`SeedSpec::Timestamp`] when omitted.
    pub seed: Option<SeedSpec>,
    /// Defaults to the lowest tier and intimacy when omitted.
    pub social_context: Option<SocialContext>,
    /// Ceilings resolved by the caller's world/user settings. Default is
    /// fully permissive.
    pub world_ceiling: Option<ContextCeiling>,
    pub user_ceiling: Option<ContextCeiling>,
    /// Pin the request to a specific provider instead of registry routing.
    pub provider_id: Option<String>,
    pub parent_generation_id: Option<DbId>,
}

#[derive(Debug, Serialize)]
pub struct SubmitGenerationResponse {
    pub generation_id: DbId,
    pub status: &'static str,
    /// `true` when an existing active generation satisfied the request.
    pub deduplicated: bool,
    /// `true` when the social context was reduced to fit a ceiling.
    pub context_clamped: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerationStatusResponse {
    pub generation_id: DbId,
    pub kind: String,
    pub provider_id: String,
    pub status: &'static str,
    pub attempt_count: i32,
    pub asset_id: Option<DbId>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/generations
///
/// Canonicalizes, fingerprints, and persists a generation request. Returns
/// the existing active generation when the fingerprint is already in flight.
pub async fn submit_generation(
    State(state): State<AppState>,
    Json(input): Json<SubmitGenerationRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let request = IntakeRequest {
        kind: input.kind,
        params: input.params,
        inputs: input.inputs,
        seed: input.seed.map(Into::into).unwrap_or(SeedStrategy::Timestamp),
        requested_context: input.social_context.unwrap_or_default(),
        world_ceiling: input.world_ceiling.unwrap_or_default(),
        user_ceiling: input.user_ceiling.unwrap_or_default(),
        provider_id: input.provider_id,
        parent_generation_id: input.parent_generation_id,
    };

    let outcome = intake::submit(&state.pool, &state.providers, request).await?;

    Ok(Json(DataResponse {
        data: SubmitGenerationResponse {
            generation_id: outcome.generation.id,
            status: status_name(&outcome.generation)?,
            deduplicated: outcome.deduplicated,
            context_clamped: outcome.context_clamped,
        },
    }))
}

/// GET /api/v1/generations/{id}
pub async fn get_generation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let generation = GenerationRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Generation",
            id,
        }))?;

    let asset_id = AssetRepo::find_by_generation(&state.pool, id)
        .await?
        .map(|asset| asset.id);

    Ok(Json(DataResponse {
        data: GenerationStatusResponse {
            generation_id: generation.id,
            kind: generation.operation_type.clone(),
            provider_id: generation.provider_id.clone(),
            status: status_name(&generation)?,
            attempt_count: generation.attempt_count,
            asset_id,
            error_code: generation.error_code.clone(),
            error_message: generation.error_message.clone(),
            created_at: generation.created_at,
            completed_at: generation.completed_at,
        },
    }))
}

/// GET /api/v1/generations
pub async fn list_generations(
    State(state): State<AppState>,
    Query(params): Query<GenerationListQuery>,
) -> AppResult<impl IntoResponse> {
    let generations = GenerationRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: generations }))
}

/// POST /api/v1/generations/{id}/cancel
///
/// Cancellation is terminal: the row never leaves `Cancelled`, and a late
/// provider success is discarded by the materializer. Cancelling a row that
/// is already terminal is a conflict, not a no-op.
pub async fn cancel_generation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let cancelled = GenerationRepo::cancel(&state.pool, id).await?;
    if !cancelled {
        let generation = GenerationRepo::find_by_id(&state.pool, id)
            .await?
            .ok_or(AppError::Core(CoreError::NotFound {
                entity: "Generation",
                id,
            }))?;
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Generation {id} is already {} and cannot be cancelled",
            status_name(&generation)?
        ))));
    }

    tracing::info!(generation_id = id, "Generation cancelled");
    Ok(Json(DataResponse {
        data: serde_json::json!({ "generation_id": id, "status": "cancelled" }),
    }))
}

/// GET /api/v1/generations/{id}/asset
pub async fn get_generation_asset(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let asset = AssetRepo::find_by_generation(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Asset for generation",
            id,
        }))?;
    Ok(Json(DataResponse { data: asset }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a row's status id to its wire name.
fn status_name(generation: &Generation) -> Result<&'static str, AppError> {
    let status = GenerationStatus::from_id(generation.status_id).ok_or_else(|| {
        AppError::InternalError(format!(
            "Generation {} has unknown status id {}",
            generation.id, generation.status_id
        ))
    })?;
    Ok(match status {
        GenerationStatus::Created => "created",
        GenerationStatus::Submitted => "submitted",
        GenerationStatus::Processing => "processing",
        GenerationStatus::Completed => "completed",
        GenerationStatus::Failed => "failed",
        GenerationStatus::Cancelled => "cancelled",
    })
}
