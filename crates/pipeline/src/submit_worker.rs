//! Background submission worker.
//!
//! Claims `Created` generations with `FOR UPDATE SKIP LOCKED` and
//! dispatches them to their provider adapter. Several workers can run
//! concurrently; the claim query guarantees each row is dispatched once.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fabula_core::operation::OperationType;
use fabula_core::CoreError;
use fabula_db::models::generation::Generation;
use fabula_db::models::submission::CreateSubmission;
use fabula_db::repositories::{GenerationRepo, SubmissionRepo};
use fabula_db::DbPool;
use fabula_provider::{ProviderAdapter, ProviderError, ProviderRegistry};

use crate::backoff::RetryConfig;
use crate::error::PipelineError;
use crate::orchestrator::{decide_dispatch_failure, DispatchDecision};

/// Default claim-polling interval.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Wall-clock budget for one provider dispatch call.
const EXECUTE_TIMEOUT: Duration = Duration::from_secs(60);

/// Claims and dispatches pending generations.
pub struct SubmitWorker {
    pool: DbPool,
    registry: Arc<ProviderRegistry>,
    poll_interval: Duration,
    backoff: RetryConfig,
}

impl SubmitWorker {
    pub fn new(pool: DbPool, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            pool,
            registry,
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff: RetryConfig::default(),
        }
    }

    /// Run the dispatch loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Submission worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Submission worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_created().await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }
    }

    /// One cycle: claim and dispatch until the queue is empty.
    async fn drain_created(&self) -> Result<(), PipelineError> {
        while let Some(generation) = GenerationRepo::claim_created(&self.pool).await? {
            self.dispatch(&generation).await?;
        }
        Ok(())
    }

    /// Dispatch one claimed generation, applying the retry policy.
    async fn dispatch(&self, generation: &Generation) -> Result<(), PipelineError> {
        tracing::info!(
            generation_id = generation.id,
            operation_type = %generation.operation_type,
            provider_id = %generation.provider_id,
            attempt = generation.attempt_count + 1,
            "Dispatching generation",
        );

        let op = match OperationType::resolve(&generation.operation_type) {
            Ok(op) => op,
            // A row with an unknown kind string predates a schema change;
            // fail it rather than looping on it forever.
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

        let params = parse_params(generation)?;

        let mut reauthed = false;
        loop {
            let result = execute_with_timeout(adapter.as_ref(), op, &params).await;

            let error = match result {
                Ok(job) => {
                    SubmissionRepo::create(
                        &self.pool,
                        &CreateSubmission {
                            generation_id: generation.id,
                            provider_job_id: job.provider_job_id.clone(),
                            raw_response: job.raw_response,
                        },
                    )
                    .await?;
                    tracing::info!(
                        generation_id = generation.id,
                        provider_job_id = %job.provider_job_id,
                        "Generation accepted by provider",
                    );
                    return Ok(());
                }
                Err(e) => e,
            };

            match decide_dispatch_failure(&error, generation.attempt_count, reauthed, &self.backoff)
            {
                DispatchDecision::RefreshSessionAndRetry => {
                    tracing::warn!(
                        generation_id = generation.id,
                        provider_id = %generation.provider_id,
                        error = %error,
                        "Session invalid; refreshing and retrying once",
                    );
                    if let Err(refresh_err) = adapter.refresh_session().await {
                        GenerationRepo::fail(
                            &self.pool,
                            generation.id,
                            refresh_err.code(),
                            &refresh_err.to_string(),
                        )
                        .await?;
                        return Ok(());
                    }
                    reauthed = true;
                }
                DispatchDecision::Requeue { delay } => {
                    tracing::warn!(
                        generation_id = generation.id,
                        error = %error,
                        delay_secs = delay.as_secs(),
                        "Transient dispatch failure; requeueing",
                    );
                    // A fresh dispatch records a fresh provider job id.
                    SubmissionRepo::delete_for_generation(&self.pool, generation.id).await?;
                    GenerationRepo::requeue_transient(
                        &self.pool,
                        generation.id,
                        delay.as_secs() as i64,
                        &error.to_string(),
                    )
                    .await?;
                    return Ok(());
                }
                DispatchDecision::Fail { code } => {
                    tracing::error!(
                        generation_id = generation.id,
                        error = %error,
                        error_code = code,
                        "Dispatch failed terminally",
                    );
                    GenerationRepo::fail(&self.pool, generation.id, code, &error.to_string())
                        .await?;
                    return Ok(());
                }
            }
        }
    }
}

/// Deserialize a row's stored canonical parameters.
fn parse_params(
    generation: &Generation,
) -> Result<fabula_core::canonical::CanonicalParams, PipelineError> {
    serde_json::from_value(generation.canonical_params.clone()).map_err(|e| {
        CoreError::Internal(format!(
            "Generation {} has malformed canonical params: {e}",
            generation.id
        ))
        .into()
    })
}

/// Execute with a wall-clock budget; a timeout is a transient failure.
async fn execute_with_timeout(
    adapter: &dyn ProviderAdapter,
    op: OperationType,
    params: &fabula_core::canonical::CanonicalParams,
) -> Result<fabula_provider::adapter::SubmittedJob, ProviderError> {
    match tokio::time::timeout(EXECUTE_TIMEOUT, adapter.execute(op, params)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Network(format!(
            "dispatch timed out after {}s",
            EXECUTE_TIMEOUT.as_secs()
        ))),
    }
}
