//! Result materialization: a provider success becomes exactly one asset.
//!
//! The transition to `Completed` and the asset insert commit in one
//! transaction, so a completed generation without its asset (or the
//! reverse) is never observable. Materialization is idempotent: a second
//! success report for the same generation degrades to the existing asset.

use fabula_core::CoreError;
use fabula_db::models::asset::{Asset, CreateAsset};
use fabula_db::models::generation::Generation;
use fabula_db::models::status::{GenerationStatus, MediaTypeId};
use fabula_db::repositories::{AssetRepo, GenerationRepo};
use fabula_db::DbPool;
use fabula_provider::ProviderResult;

use crate::error::PipelineError;

/// What a success report should do given the generation's current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeAction {
    /// Transition to `Completed` and insert the asset.
    Create,
    /// Already materialized; return the existing asset.
    AlreadyCompleted,
    /// The generation was cancelled mid-flight. A late provider success
    /// must not resurrect it: no asset, status stays `Cancelled`.
    RefuseCancelled,
    /// `Created` or `Failed` rows have no submission a success could
    /// belong to; the report is a bug or a very stale poll.
    InvalidState,
}

/// Pure dispatch table from generation status to materialization action.
pub fn finalize_action(status: GenerationStatus) -> FinalizeAction {
    match status {
        GenerationStatus::Submitted | GenerationStatus::Processing => FinalizeAction::Create,
        GenerationStatus::Completed => FinalizeAction::AlreadyCompleted,
        GenerationStatus::Cancelled => FinalizeAction::RefuseCancelled,
        GenerationStatus::Created | GenerationStatus::Failed => FinalizeAction::InvalidState,
    }
}

/// Outcome of materializing a provider success.
#[derive(Debug)]
pub enum FinalizeOutcome {
    /// The asset now linked to this generation (created or pre-existing).
    Materialized(Asset),
    /// The generation was cancelled; the result was discarded.
    Discarded,
}

/// Apply a provider success to a generation.
pub async fn finalize(
    pool: &DbPool,
    generation: &Generation,
    result: &ProviderResult,
) -> Result<FinalizeOutcome, PipelineError> {
    let status = GenerationStatus::from_id(generation.status_id).ok_or_else(|| {
        CoreError::Internal(format!(
            "Generation {} has unknown status id {}",
            generation.id, generation.status_id
        ))
    })?;

    match finalize_action(status) {
        FinalizeAction::Create => create_asset(pool, generation, result).await,
        FinalizeAction::AlreadyCompleted => existing_asset(pool, generation).await,
        FinalizeAction::RefuseCancelled => {
            tracing::warn!(
                generation_id = generation.id,
                remote_url = %result.remote_url,
                "Discarding provider result for cancelled generation",
            );
            Ok(FinalizeOutcome::Discarded)
        }
        FinalizeAction::InvalidState => Err(CoreError::Conflict(format!(
            "Generation {} cannot accept a result in status {status:?}",
            generation.id
        ))
        .into()),
    }
}

async fn create_asset(
    pool: &DbPool,
    generation: &Generation,
    result: &ProviderResult,
) -> Result<FinalizeOutcome, PipelineError> {
    let create = CreateAsset {
        media_type_id: MediaTypeId::from(result.media_type).id(),
        provider_asset_id: result.provider_asset_id.clone(),
        remote_url: result.remote_url.clone(),
        source_generation_id: generation.id,
        parent_asset_ids: generation.inputs.clone(),
        media_metadata: result.raw.clone(),
    };

    let mut tx = pool.begin().await.map_err(PipelineError::Db)?;

    let completed = GenerationRepo::complete_in_tx(&mut tx, generation.id).await?;
    if !completed {
        // The row left the pollable states between our read and this CAS.
        // Roll back and re-dispatch on the fresh status.
        tx.rollback().await.map_err(PipelineError::Db)?;
        let fresh = GenerationRepo::find_by_id(pool, generation.id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "generation",
                id: generation.id,
            })?;
        return Box::pin(finalize(pool, &fresh, result)).await;
    }

    let asset = AssetRepo::create_in_tx(&mut tx, &create).await?;
    tx.commit().await.map_err(PipelineError::Db)?;

    tracing::info!(
        generation_id = generation.id,
        asset_id = asset.id,
        media_type_id = asset.media_type_id,
        "Generation completed and asset materialized",
    );
    Ok(FinalizeOutcome::Materialized(asset))
}

async fn existing_asset(
    pool: &DbPool,
    generation: &Generation,
) -> Result<FinalizeOutcome, PipelineError> {
    let asset = AssetRepo::find_by_generation(pool, generation.id)
        .await?
        .ok_or_else(|| {
            CoreError::Internal(format!(
                "Completed generation {} has no asset",
                generation.id
            ))
        })?;
    Ok(FinalizeOutcome::Materialized(asset))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
