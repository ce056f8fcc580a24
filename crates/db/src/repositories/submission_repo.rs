//! Repository for the `provider_submissions` table.

use sqlx::PgPool;

use fabula_core::types::DbId;

use crate::models::submission::{CreateSubmission, ProviderSubmission};

/// Column list for `provider_submissions` queries.
const COLUMNS: &str =
    "id, generation_id, provider_job_id, raw_response, last_polled_at, created_at";

/// Provides operations for the 1:1 generation/provider-job mapping.
pub struct SubmissionRepo;

impl SubmissionRepo {
    /// Record a provider's acceptance of a generation.
    ///
    /// The unique index on `generation_id` makes a second submission for
    /// the same generation a constraint violation rather than silent
    /// duplication.
    pub async fn create(
        pool: &PgPool,
        input: &CreateSubmission,
    ) -> Result<ProviderSubmission, sqlx::Error> {
        let query = format!(
            "INSERT INTO provider_submissions (generation_id, provider_job_id, raw_response) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProviderSubmission>(&query)
            .bind(input.generation_id)
            .bind(&input.provider_job_id)
            .bind(&input.raw_response)
            .fetch_one(pool)
            .await
    }

    /// Find the submission for a generation.
    pub async fn find_by_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<Option<ProviderSubmission>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM provider_submissions WHERE generation_id = $1"
        );
        sqlx::query_as::<_, ProviderSubmission>(&query)
            .bind(generation_id)
            .fetch_optional(pool)
            .await
    }

    /// Record a poll attempt. Also acts as the poller's claim: a row whose
    /// `last_polled_at` was just touched drops out of the stale set other
    /// pollers select from.
    pub async fn touch_polled(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE provider_submissions SET last_polled_at = NOW() WHERE generation_id = $1",
        )
        .bind(generation_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete the submission for a requeued generation so the next dispatch
    /// attempt can record a fresh provider job id.
    pub async fn delete_for_generation(
        pool: &PgPool,
        generation_id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM provider_submissions WHERE generation_id = $1")
            .bind(generation_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
