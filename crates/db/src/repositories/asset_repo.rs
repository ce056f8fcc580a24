//! Repository for the `assets` table.

use sqlx::{PgPool, Postgres, Transaction};

use fabula_core::types::DbId;

use crate::models::asset::{Asset, CreateAsset};
use crate::models::status::ModerationStatus;

/// Column list for `assets` queries.
const COLUMNS: &str = "\
    id, media_type_id, provider_asset_id, remote_url, source_generation_id, \
    parent_asset_ids, media_metadata, moderation_status_id, created_at";

/// Provides operations for materialized assets.
pub struct AssetRepo;

impl AssetRepo {
    /// Insert an asset within an existing transaction.
    ///
    /// The materializer commits this together with the generation's
    /// `Completed` transition so a partially written lineage graph is never
    /// observable. The unique index on `source_generation_id` enforces
    /// exactly one asset per generation at the storage layer.
    pub async fn create_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateAsset,
    ) -> Result<Asset, sqlx::Error> {
        let query = format!(
            "INSERT INTO assets \
                 (media_type_id, provider_asset_id, remote_url, \
                  source_generation_id, parent_asset_ids, media_metadata, \
                  moderation_status_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(input.media_type_id)
            .bind(&input.provider_asset_id)
            .bind(&input.remote_url)
            .bind(input.source_generation_id)
            .bind(&input.parent_asset_ids)
            .bind(&input.media_metadata)
            .bind(ModerationStatus::Pending.id())
            .fetch_one(&mut **tx)
            .await
    }

    /// Find an asset by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Asset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assets WHERE id = $1");
        sqlx::query_as::<_, Asset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the asset produced by a generation, if any.
    pub async fn find_by_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<Option<Asset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assets WHERE source_generation_id = $1");
        sqlx::query_as::<_, Asset>(&query)
            .bind(generation_id)
            .fetch_optional(pool)
            .await
    }

    /// Update moderation status. The only permitted mutation of an asset,
    /// owned by the external moderation collaborator.
    pub async fn set_moderation_status(
        pool: &PgPool,
        id: DbId,
        status: ModerationStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE assets SET moderation_status_id = $2 WHERE id = $1")
            .bind(id)
            .bind(status.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
