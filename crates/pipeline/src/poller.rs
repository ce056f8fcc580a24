//! Background status poller.
//!
//! Periodically polls the provider for every generation in a pollable
//! state (`Submitted` or `Processing`) whose last poll has gone stale.
//! Touching `last_polled_at` doubles as the claim: a row just touched
//! drops out of the stale set other poller instances select from.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fabula_core::operation::OperationType;
use fabula_db::models::generation::Generation;
use fabula_db::models::status::GenerationStatus;
use fabula_db::repositories::{GenerationRepo, SubmissionRepo};
use fabula_db::DbPool;
use fabula_provider::{
    ErrorClass, PollOutcome, ProviderAdapter, ProviderError, ProviderRegistry,
};

use crate::error::PipelineError;
use crate::materializer;

/// Default interval between poll cycles.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Minimum age of a submission's last poll before it is polled again.
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10);

/// Maximum generations polled per cycle.
const DEFAULT_BATCH_SIZE: i64 = 20;

/// Wall-clock budget for one provider status call.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a provider-reported job failure is proof the job itself died.
///
/// Some providers surface infrastructure trouble (a 5xx, an expired
/// session) inside a job status report. Those classes say nothing about
/// the job, which may still be running.
fn job_failure_is_terminal(e: &ProviderError) -> bool {
    e.classify() == ErrorClass::Terminal
}

/// Polls in-flight generations and drives them to a terminal state.
pub struct Poller {
    pool: DbPool,
    registry: Arc<ProviderRegistry>,
    poll_interval: Duration,
    stale_after: Duration,
    batch_size: i64,
}

impl Poller {
    pub fn new(pool: DbPool, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            pool,
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Status poller started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Status poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_cycle().await {
                        tracing::error!(error = %e, "Poll cycle failed");
                    }
                }
            }
        }
    }

    /// One cycle: poll every stale in-flight generation once.
    async fn poll_cycle(&self) -> Result<(), PipelineError> {
        let pollable = GenerationRepo::list_pollable(
            &self.pool,
            self.stale_after.as_secs() as i64,
            self.batch_size,
        )
        .await?;

        for generation in pollable {
            if let Err(e) = self.poll_one(&generation).await {
                tracing::error!(
                    generation_id = generation.id,
                    error = %e,
                    "Polling generation failed",
                );
            }
        }
        Ok(())
    }

    async fn poll_one(&self, generation: &Generation) -> Result<(), PipelineError> {
        let submission = match SubmissionRepo::find_by_generation(&self.pool, generation.id).await?
        {
            Some(submission) => submission,
            // Pollable status without a submission row: the dispatch that
            // claimed it crashed between claim and record. Requeue.
            None => {
                tracing::warn!(
                    generation_id = generation.id,
                    "Pollable generation has no submission; requeueing",
                );
                GenerationRepo::requeue_transient(
                    &self.pool,
                    generation.id,
                    0,
                    "submission record missing after dispatch",
                )
                .await?;
                return Ok(());
            }
        };

        // Claim the row for this cycle.
        SubmissionRepo::touch_polled(&self.pool, generation.id).await?;

        let op = match OperationType::resolve(&generation.operation_type) {
            Ok(op) => op,
            Err(e) => {
                GenerationRepo::fail(&self.pool, generation.id, "unmapped_operation", &e.to_string())
                    .await?;
                return Ok(());
            }
        };

        let adapter = match self.registry.get(&generation.provider_id) {
            Some(adapter) => adapter,
            None => {
                GenerationRepo::fail(
                    &self.pool,
                    generation.id,
                    "unknown_provider",
                    &format!("Provider \"{}\" is not registered", generation.provider_id),
                )
                .await?;
                return Ok(());
            }
        };

        let mut reauthed = false;
        loop {
            let outcome = match tokio::time::timeout(
                POLL_TIMEOUT,
                adapter.check_status(op, &submission.provider_job_id),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Network(format!(
                    "status poll timed out after {}s",
                    POLL_TIMEOUT.as_secs()
                ))),
            };

            // A failure report carrying a transient or session-class error
            // is not proof the job died; demote it to a poll error so it
            // takes the same classification path as any other failure.
            let outcome = match outcome {
                Ok(PollOutcome::Failed(e)) if !job_failure_is_terminal(&e) => Err(e),
                other => other,
            };

            match outcome {
                Ok(PollOutcome::Pending) => {
                    // First pending observation moves Submitted -> Processing.
                    // Losing the CAS means another actor moved the row; fine.
                    if generation.status_id == GenerationStatus::Submitted.id() {
                        GenerationRepo::mark_processing(&self.pool, generation.id).await?;
                    }
                    return Ok(());
                }
                Ok(PollOutcome::Completed(result)) => {
                    materializer::finalize(&self.pool, generation, &result).await?;
                    return Ok(());
                }
                Ok(PollOutcome::Failed(e)) => {
                    tracing::warn!(
                        generation_id = generation.id,
                        error = %e,
                        "Provider reported terminal job failure",
                    );
                    GenerationRepo::fail(&self.pool, generation.id, e.code(), &e.to_string())
                        .await?;
                    return Ok(());
                }
                Err(e) => match e.classify() {
                    // The poll itself failed transiently: try again next
                    // cycle; last_polled_at was already touched.
                    ErrorClass::Transient => {
                        tracing::warn!(
                            generation_id = generation.id,
                            error = %e,
                            "Transient poll failure; will retry next cycle",
                        );
                        return Ok(());
                    }
                    ErrorClass::SessionInvalid if !reauthed => {
                        tracing::warn!(
                            generation_id = generation.id,
                            provider_id = %generation.provider_id,
                            "Session invalid during poll; refreshing",
                        );
                        if adapter.refresh_session().await.is_err() {
                            // Leave the row for the next cycle; the dispatch
                            // path owns terminal re-auth failures.
                            return Ok(());
                        }
                        reauthed = true;
                    }
                    // A second session failure or an unclassifiable poll
                    // response: retry next cycle rather than failing a job
                    // that may still be running provider-side.
                    ErrorClass::SessionInvalid => return Ok(()),
                    ErrorClass::Terminal => {
                        GenerationRepo::fail(&self.pool, generation.id, e.code(), &e.to_string())
                            .await?;
                        return Ok(());
                    }
                },
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
