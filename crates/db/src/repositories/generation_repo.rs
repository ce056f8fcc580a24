//! Repository for the `generations` table.
//!
//! All status mutations are compare-and-swap updates guarded by the
//! expected prior status; a transition attempted from an unexpected state
//! affects zero rows and is reported to the caller, never overwritten.

use sqlx::PgPool;

use fabula_core::types::DbId;

use crate::models::generation::{CreateGeneration, Generation, GenerationListQuery};
use crate::models::status::{GenerationStatus, StatusId};

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    id, operation_type, provider_id, inputs, canonical_params, \
    reproducible_hash, relationship_tier, intimacy_level, status_id, \
    parent_generation_id, attempt_count, next_attempt_at, \
    error_code, error_message, \
    created_at, submitted_at, completed_at, updated_at";

/// Maximum page size for generation listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for generation listing.
const DEFAULT_LIMIT: i64 = 50;

/// Terminal statuses: completed, failed, cancelled.
const TERMINAL_STATUSES: [StatusId; 3] = [
    GenerationStatus::Completed as StatusId,
    GenerationStatus::Failed as StatusId,
    GenerationStatus::Cancelled as StatusId,
];

/// Provides CRUD and lifecycle operations for generation records.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a new generation in `Created` status.
    pub async fn create(
        pool: &PgPool,
        input: &CreateGeneration,
    ) -> Result<Generation, sqlx::Error> {
        let query = format!(
            "INSERT INTO generations \
                 (operation_type, provider_id, inputs, canonical_params, \
                  reproducible_hash, relationship_tier, intimacy_level, \
                  status_id, parent_generation_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(&input.operation_type)
            .bind(&input.provider_id)
            .bind(&input.inputs)
            .bind(&input.canonical_params)
            .bind(&input.reproducible_hash)
            .bind(input.relationship_tier)
            .bind(input.intimacy_level)
            .bind(GenerationStatus::Created.id())
            .bind(input.parent_generation_id)
            .fetch_one(pool)
            .await
    }

    /// Find a generation by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a non-terminal generation with the given reproducible hash.
    ///
    /// The dedup check: a hit means the request fingerprint is already in
    /// flight (or completed) and must be returned instead of creating a
    /// duplicate. Backed by a unique partial index on non-terminal rows.
    pub async fn find_active_by_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE reproducible_hash = $1 AND status_id NOT IN ($2, $3) \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        // Completed rows also satisfy dedup (the asset already exists);
        // only failed and cancelled rows are eligible for a fresh attempt.
        sqlx::query_as::<_, Generation>(&query)
            .bind(hash)
            .bind(GenerationStatus::Failed.id())
            .bind(GenerationStatus::Cancelled.id())
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the next dispatchable `Created` generation.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent submission
    /// workers never double-dispatch; a claim lost to another worker is a
    /// normal race outcome (returns `None` for that row), not an error.
    pub async fn claim_created(pool: &PgPool) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!(
            "UPDATE generations \
             SET status_id = $1, submitted_at = NOW(), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM generations \
                 WHERE status_id = $2 AND next_attempt_at <= NOW() \
                 ORDER BY created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(GenerationStatus::Submitted.id())
            .bind(GenerationStatus::Created.id())
            .fetch_optional(pool)
            .await
    }

    /// Compare-and-swap status transition.
    ///
    /// Returns `true` if the row was in `expected` status and is now in
    /// `to`; `false` if another worker got there first.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        expected: GenerationStatus,
        to: GenerationStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $3, updated_at = NOW() \
             WHERE id = $1 AND status_id = $2",
        )
        .bind(id)
        .bind(expected.id())
        .bind(to.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// First successful poll: `Submitted` -> `Processing`.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::transition(
            pool,
            id,
            GenerationStatus::Submitted,
            GenerationStatus::Processing,
        )
        .await
    }

    /// Mark a generation as terminally failed with a structured error.
    ///
    /// CAS-guarded: only non-terminal rows move to `Failed`.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        error_code: &str,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, error_code = $3, error_message = $4, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($5, $6, $7)",
        )
        .bind(id)
        .bind(GenerationStatus::Failed.id())
        .bind(error_code)
        .bind(error_message)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a generation `Completed` within an existing transaction.
    ///
    /// CAS from `Submitted` or `Processing`; the materializer commits this
    /// together with the asset insert so the row and its asset appear
    /// atomically. Returns `false` if the row left the pollable states
    /// first (e.g. cancelled mid-flight).
    pub async fn complete_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4)",
        )
        .bind(id)
        .bind(GenerationStatus::Completed.id())
        .bind(GenerationStatus::Submitted.id())
        .bind(GenerationStatus::Processing.id())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a generation if it is not already in a terminal state.
    ///
    /// Returns `true` if the row was cancelled, `false` if it was already
    /// completed, failed, or cancelled.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($3, $4, $5)",
        )
        .bind(id)
        .bind(GenerationStatus::Cancelled.id())
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Requeue a claimed generation after a transient dispatch failure.
    ///
    /// `Submitted` -> `Created` with the attempt counter bumped and the
    /// next attempt deferred by the backoff delay. The same row is reused;
    /// retries never create a new generation.
    pub async fn requeue_transient(
        pool: &PgPool,
        id: DbId,
        delay_secs: i64,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, attempt_count = attempt_count + 1, \
                 next_attempt_at = NOW() + make_interval(secs => $3), \
                 error_message = $4, updated_at = NOW() \
             WHERE id = $1 AND status_id = $5",
        )
        .bind(id)
        .bind(GenerationStatus::Created.id())
        .bind(delay_secs as f64)
        .bind(error_message)
        .bind(GenerationStatus::Submitted.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List generations in a pollable state (`Submitted` or `Processing`)
    /// whose last poll is older than `stale_after_secs`, oldest first.
    pub async fn list_pollable(
        pool: &PgPool,
        stale_after_secs: i64,
        limit: i64,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations g \
             WHERE g.status_id IN ($1, $2) \
               AND EXISTS ( \
                   SELECT 1 FROM provider_submissions s \
                   WHERE s.generation_id = g.id \
                     AND (s.last_polled_at IS NULL \
                          OR s.last_polled_at < NOW() - make_interval(secs => $3)) \
               ) \
             ORDER BY g.submitted_at ASC NULLS FIRST \
             LIMIT $4"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(GenerationStatus::Submitted.id())
            .bind(GenerationStatus::Processing.id())
            .bind(stale_after_secs as f64)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// List generations with optional status filter and pagination.
    pub async fn list(
        pool: &PgPool,
        params: &GenerationListQuery,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        match params.status_id {
            Some(status_id) => {
                let query = format!(
                    "SELECT {COLUMNS} FROM generations \
                     WHERE status_id = $1 \
                     ORDER BY created_at DESC \
                     LIMIT $2 OFFSET $3"
                );
                sqlx::query_as::<_, Generation>(&query)
                    .bind(status_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM generations \
                     ORDER BY created_at DESC \
                     LIMIT $1 OFFSET $2"
                );
                sqlx::query_as::<_, Generation>(&query)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
            }
        }
    }
}
