//! Generation entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use fabula_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `generations` table.
///
/// Owned exclusively by the job orchestrator; status transitions via the
/// repository's compare-and-swap methods are the only permitted mutation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: DbId,
    /// Canonical operation kind string (e.g. `video_extend`).
    pub operation_type: String,
    pub provider_id: String,
    /// Raw input references as supplied by the caller (JSON array of strings).
    pub inputs: serde_json::Value,
    pub canonical_params: serde_json::Value,
    pub reproducible_hash: String,
    pub relationship_tier: i16,
    pub intimacy_level: i16,
    pub status_id: StatusId,
    pub parent_generation_id: Option<DbId>,
    pub attempt_count: i32,
    /// Earliest time the submission worker may (re)dispatch this row.
    pub next_attempt_at: Timestamp,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub submitted_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new generation row.
#[derive(Debug, Clone)]
pub struct CreateGeneration {
    pub operation_type: String,
    pub provider_id: String,
    pub inputs: serde_json::Value,
    pub canonical_params: serde_json::Value,
    pub reproducible_hash: String,
    pub relationship_tier: i16,
    pub intimacy_level: i16,
    pub parent_generation_id: Option<DbId>,
}

/// Query parameters for listing generations.
#[derive(Debug, Deserialize)]
pub struct GenerationListQuery {
    /// Filter by status ID.
    pub status_id: Option<StatusId>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}
