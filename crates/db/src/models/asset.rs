//! Asset entity models.
//!
//! An asset is created exactly once per successful generation by the result
//! materializer and is immutable after creation except for
//! `moderation_status_id`, which an external moderation collaborator owns.

use serde::Serialize;
use sqlx::FromRow;

use fabula_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Asset {
    pub id: DbId,
    /// Explicit media type (lookup id). Written from the adapter's declared
    /// type; the materializer never sniffs the payload for it.
    pub media_type_id: StatusId,
    pub provider_asset_id: String,
    pub remote_url: String,
    /// Lineage back to the generation that produced this asset.
    pub source_generation_id: DbId,
    /// Parent asset references for multi-input operations (JSON array of ids).
    pub parent_asset_ids: serde_json::Value,
    /// Full raw provider payload.
    pub media_metadata: serde_json::Value,
    pub moderation_status_id: StatusId,
    pub created_at: Timestamp,
}

/// DTO for materializing a new asset.
#[derive(Debug, Clone)]
pub struct CreateAsset {
    pub media_type_id: StatusId,
    pub provider_asset_id: String,
    pub remote_url: String,
    pub source_generation_id: DbId,
    pub parent_asset_ids: serde_json::Value,
    pub media_metadata: serde_json::Value,
}
