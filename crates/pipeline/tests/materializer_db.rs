//! Materialization against a real database: the status transition and the
//! asset insert commit together, repeated success reports converge on one
//! asset, and a cancel always beats a late success.

use assert_matches::assert_matches;
use serde_json::json;
use sqlx::PgPool;

use fabula_core::operation::MediaType;
use fabula_db::models::generation::{CreateGeneration, Generation};
use fabula_db::models::status::GenerationStatus;
use fabula_db::repositories::{AssetRepo, GenerationRepo};
use fabula_pipeline::materializer::{self, FinalizeOutcome};
use fabula_provider::ProviderResult;

/// Insert a generation and claim it, leaving it in `Submitted`.
async fn submitted_generation(pool: &PgPool) -> Generation {
    GenerationRepo::create(
        pool,
        &CreateGeneration {
            operation_type: "video_extend".to_string(),
            provider_id: "mirage".to_string(),
            inputs: json!(["881"]),
            canonical_params: json!({ "video_url": "https://cdn.example/src/clip.mp4" }),
            reproducible_hash: "fp-mat".to_string(),
            relationship_tier: 1,
            intimacy_level: 1,
            parent_generation_id: None,
        },
    )
    .await
    .unwrap();
    GenerationRepo::claim_created(pool).await.unwrap().unwrap()
}

fn video_result() -> ProviderResult {
    ProviderResult {
        media_type: MediaType::Video,
        provider_asset_id: "ast-9".to_string(),
        remote_url: "https://cdn.example/out/ast-9.mp4".to_string(),
        raw: json!({ "status": "succeeded" }),
    }
}

// ---------------------------------------------------------------------------
// Test: completion and asset insert land atomically
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn finalize_commits_status_and_asset_together(pool: PgPool) {
    let generation = submitted_generation(&pool).await;

    let outcome = materializer::finalize(&pool, &generation, &video_result())
        .await
        .unwrap();
    let asset = match outcome {
        FinalizeOutcome::Materialized(asset) => asset,
        other => panic!("expected a materialized asset, got {other:?}"),
    };
    assert_eq!(asset.source_generation_id, generation.id);
    assert_eq!(asset.remote_url, "https://cdn.example/out/ast-9.mp4");

    let row = GenerationRepo::find_by_id(&pool, generation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status_id, GenerationStatus::Completed.id());
    assert!(row.completed_at.is_some());
}

// ---------------------------------------------------------------------------
// Test: double finalize converges on one asset
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn repeated_success_reports_materialize_one_asset(pool: PgPool) {
    let generation = submitted_generation(&pool).await;

    let first = match materializer::finalize(&pool, &generation, &video_result())
        .await
        .unwrap()
    {
        FinalizeOutcome::Materialized(asset) => asset,
        other => panic!("expected a materialized asset, got {other:?}"),
    };

    // A second poller retries with its stale `Submitted` snapshot: the
    // completion CAS loses, the fresh row is re-read, and the existing
    // asset comes back instead of a duplicate insert.
    let second = match materializer::finalize(&pool, &generation, &video_result())
        .await
        .unwrap()
    {
        FinalizeOutcome::Materialized(asset) => asset,
        other => panic!("expected the existing asset, got {other:?}"),
    };
    assert_eq!(first.id, second.id);
}

// ---------------------------------------------------------------------------
// Test: a cancel racing a success report wins
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn cancel_racing_a_success_report_discards_the_result(pool: PgPool) {
    let generation = submitted_generation(&pool).await;

    // The cancel lands after the poller read the row but before finalize:
    // `generation` is now a stale snapshot in a pollable state.
    assert!(GenerationRepo::cancel(&pool, generation.id).await.unwrap());

    let outcome = materializer::finalize(&pool, &generation, &video_result())
        .await
        .unwrap();
    assert_matches!(outcome, FinalizeOutcome::Discarded);

    // No asset, and the row never left Cancelled.
    assert!(AssetRepo::find_by_generation(&pool, generation.id)
        .await
        .unwrap()
        .is_none());
    let row = GenerationRepo::find_by_id(&pool, generation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status_id, GenerationStatus::Cancelled.id());
}
