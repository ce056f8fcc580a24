//! Integration tests for the generation lifecycle at the storage layer:
//! the partial-unique dedup index, claim mutual exclusion, and the
//! compare-and-swap transition guards.

use serde_json::json;
use sqlx::PgPool;

use fabula_db::models::generation::CreateGeneration;
use fabula_db::models::status::GenerationStatus;
use fabula_db::repositories::GenerationRepo;

fn extend_request(hash: &str) -> CreateGeneration {
    CreateGeneration {
        operation_type: "video_extend".to_string(),
        provider_id: "mirage".to_string(),
        inputs: json!(["881"]),
        canonical_params: json!({ "video_url": "https://cdn.example/src/clip.mp4" }),
        reproducible_hash: hash.to_string(),
        relationship_tier: 1,
        intimacy_level: 1,
        parent_generation_id: None,
    }
}

// ---------------------------------------------------------------------------
// Test: at most one live generation per fingerprint
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_live_fingerprint_is_rejected_by_the_index(pool: PgPool) {
    let first = GenerationRepo::create(&pool, &extend_request("fp-1"))
        .await
        .unwrap();
    assert_eq!(first.status_id, GenerationStatus::Created.id());

    // A second insert with the same fingerprint while the first is live
    // must hit the partial unique index, even if the application-level
    // dedup lookup raced past it.
    let err = GenerationRepo::create(&pool, &extend_request("fp-1"))
        .await
        .unwrap_err();
    match err {
        sqlx::Error::Database(db) => {
            assert_eq!(db.constraint(), Some("uq_generations_active_hash"));
        }
        other => panic!("expected a unique violation, got {other:?}"),
    }

    // A terminal row frees the fingerprint for a fresh attempt.
    assert!(GenerationRepo::cancel(&pool, first.id).await.unwrap());
    GenerationRepo::create(&pool, &extend_request("fp-1"))
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn dedup_lookup_ignores_failed_and_cancelled_rows(pool: PgPool) {
    let row = GenerationRepo::create(&pool, &extend_request("fp-2"))
        .await
        .unwrap();

    let hit = GenerationRepo::find_active_by_hash(&pool, "fp-2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.id, row.id);

    assert!(GenerationRepo::cancel(&pool, row.id).await.unwrap());
    assert!(GenerationRepo::find_active_by_hash(&pool, "fp-2")
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Test: claim_created hands each row to exactly one worker
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_created_hands_each_row_to_exactly_one_worker(pool: PgPool) {
    let a = GenerationRepo::create(&pool, &extend_request("fp-a"))
        .await
        .unwrap();
    let b = GenerationRepo::create(&pool, &extend_request("fp-b"))
        .await
        .unwrap();

    let first = GenerationRepo::claim_created(&pool).await.unwrap().unwrap();
    let second = GenerationRepo::claim_created(&pool).await.unwrap().unwrap();

    // Two claims, two distinct rows, both moved to Submitted.
    assert_ne!(first.id, second.id);
    let ids = [first.id, second.id];
    assert!(ids.contains(&a.id) && ids.contains(&b.id));
    assert_eq!(first.status_id, GenerationStatus::Submitted.id());
    assert_eq!(second.status_id, GenerationStatus::Submitted.id());
    assert!(first.submitted_at.is_some());

    // Queue drained: a third claim finds nothing.
    assert!(GenerationRepo::claim_created(&pool).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: complete_in_tx loses the CAS to a concurrent cancel
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn complete_in_tx_loses_the_race_to_a_cancel(pool: PgPool) {
    GenerationRepo::create(&pool, &extend_request("fp-c"))
        .await
        .unwrap();
    let claimed = GenerationRepo::claim_created(&pool).await.unwrap().unwrap();

    // The cancel lands between the poller's read and its completion CAS.
    assert!(GenerationRepo::cancel(&pool, claimed.id).await.unwrap());

    let mut tx = pool.begin().await.unwrap();
    let completed = GenerationRepo::complete_in_tx(&mut tx, claimed.id)
        .await
        .unwrap();
    tx.rollback().await.unwrap();
    assert!(!completed, "completion must not overwrite a cancelled row");

    let row = GenerationRepo::find_by_id(&pool, claimed.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status_id, GenerationStatus::Cancelled.id());
}

// ---------------------------------------------------------------------------
// Test: requeue reuses the same row and defers the next attempt
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn requeue_returns_the_same_row_to_the_queue_with_backoff(pool: PgPool) {
    GenerationRepo::create(&pool, &extend_request("fp-r"))
        .await
        .unwrap();
    let claimed = GenerationRepo::claim_created(&pool).await.unwrap().unwrap();

    assert!(
        GenerationRepo::requeue_transient(&pool, claimed.id, 60, "overloaded")
            .await
            .unwrap()
    );
    let row = GenerationRepo::find_by_id(&pool, claimed.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status_id, GenerationStatus::Created.id());
    assert_eq!(row.attempt_count, claimed.attempt_count + 1);
    assert!(row.next_attempt_at > claimed.next_attempt_at);

    // Deferred rows are invisible to the claim query until the delay elapses.
    assert!(GenerationRepo::claim_created(&pool).await.unwrap().is_none());

    // A second requeue without a fresh claim affects nothing (CAS from
    // Submitted only).
    assert!(
        !GenerationRepo::requeue_transient(&pool, claimed.id, 60, "again")
            .await
            .unwrap()
    );
}

// ---------------------------------------------------------------------------
// Test: fail refuses to overwrite terminal rows
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn fail_is_a_no_op_on_terminal_rows(pool: PgPool) {
    let row = GenerationRepo::create(&pool, &extend_request("fp-f"))
        .await
        .unwrap();
    assert!(GenerationRepo::cancel(&pool, row.id).await.unwrap());

    assert!(!GenerationRepo::fail(&pool, row.id, "job_failed", "late report")
        .await
        .unwrap());

    let fresh = GenerationRepo::find_by_id(&pool, row.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.status_id, GenerationStatus::Cancelled.id());
    assert!(fresh.error_code.is_none());
}
