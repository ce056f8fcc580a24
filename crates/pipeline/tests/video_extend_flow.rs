//! End-to-end decision flow for a video_extend request, exercised against
//! a mock provider adapter: canonicalize, fingerprint, route, dispatch,
//! poll, and materialization gating, without a database or network.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;

use fabula_core::canonical::{self, CanonicalParams};
use fabula_core::hashing::{reproducible_hash, SeedStrategy};
use fabula_core::operation::{MediaType, OperationType};
use fabula_db::models::status::GenerationStatus;
use fabula_pipeline::materializer::{finalize_action, FinalizeAction};
use fabula_pipeline::orchestrator::{decide_dispatch_failure, DispatchDecision, MAX_ATTEMPTS};
use fabula_pipeline::backoff::RetryConfig;
use fabula_provider::adapter::{PollOutcome, ProviderResult, SubmittedJob};
use fabula_provider::{ProviderAdapter, ProviderError, ProviderRegistry};

/// Scripted adapter: accepts one job, reports pending once, then success.
struct ScriptedAdapter {
    polls: AtomicU32,
}

impl ScriptedAdapter {
    fn new() -> Self {
        Self {
            polls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider_id(&self) -> &'static str {
        "scripted"
    }

    fn supported_operations(&self) -> &'static [OperationType] {
        &[OperationType::VideoExtend]
    }

    async fn execute(
        &self,
        op: OperationType,
        params: &CanonicalParams,
    ) -> Result<SubmittedJob, ProviderError> {
        assert_eq!(op, OperationType::VideoExtend);
        assert!(params.contains_key("video_url"));
        Ok(SubmittedJob {
            provider_job_id: "job-77".to_string(),
            raw_response: json!({ "job_id": "job-77" }),
        })
    }

    async fn check_status(
        &self,
        op: OperationType,
        provider_job_id: &str,
    ) -> Result<PollOutcome, ProviderError> {
        assert_eq!(provider_job_id, "job-77");
        match self.polls.fetch_add(1, Ordering::SeqCst) {
            0 => Ok(PollOutcome::Pending),
            _ => Ok(PollOutcome::Completed(ProviderResult {
                media_type: MediaType::for_operation(op),
                provider_asset_id: "ast-9".to_string(),
                remote_url: "https://cdn.example/out/ast-9.mp4".to_string(),
                raw: json!({ "status": "succeeded" }),
            })),
        }
    }

    async fn refresh_session(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[tokio::test]
async fn video_extend_flows_from_request_to_materialized_video() {
    // Route: the registry picks the capable adapter for video_extend.
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(ScriptedAdapter::new()));
    let adapter = registry.adapter_for(OperationType::VideoExtend).unwrap();

    // Canonicalize a caller request extending an existing clip.
    let op = OperationType::resolve("video_extend").unwrap();
    let structured = json!({
        "video_url": "https://cdn.example/src/clip.mp4",
        "original_video_id": "881",
        "duration_secs": 4
    });
    let params = canonical::canonicalize(op, &structured, adapter.provider_id()).unwrap();

    // Same request, same playthrough: identical fingerprint, so the
    // second submission would dedup instead of starting a second job.
    let seed = SeedStrategy::Playthrough("save-slot-1".to_string());
    let inputs = vec!["881".to_string()];
    let first = reproducible_hash(op, &params, &inputs, &seed);
    let second = reproducible_hash(op, &params, &inputs, &seed);
    assert_eq!(first, second);
    assert!(seed.is_deduplicable());

    // Dispatch.
    let job = adapter.execute(op, &params).await.unwrap();
    assert_eq!(job.provider_job_id, "job-77");

    // First poll: still pending, Submitted -> Processing.
    assert_matches!(
        adapter.check_status(op, &job.provider_job_id).await.unwrap(),
        PollOutcome::Pending
    );
    assert!(GenerationStatus::can_transition(
        GenerationStatus::Submitted,
        GenerationStatus::Processing
    ));

    // Second poll: done, with the media type taken from the operation.
    let result = match adapter.check_status(op, &job.provider_job_id).await.unwrap() {
        PollOutcome::Completed(result) => result,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(result.media_type, MediaType::Video);

    // Materialization gate: processing row materializes, and a repeat
    // success report degrades to the existing asset.
    assert_eq!(
        finalize_action(GenerationStatus::Processing),
        FinalizeAction::Create
    );
    assert_eq!(
        finalize_action(GenerationStatus::Completed),
        FinalizeAction::AlreadyCompleted
    );
}

#[test]
fn transient_dispatch_failures_exhaust_into_terminal_failure() {
    let backoff = RetryConfig::default();
    let err = ProviderError::ServerError {
        status: 503,
        body: "overloaded".to_string(),
    };

    // Attempts 1 and 2 requeue with growing delays; attempt 3 gives up.
    let mut delays = Vec::new();
    for attempt_count in 0..MAX_ATTEMPTS {
        match decide_dispatch_failure(&err, attempt_count, false, &backoff) {
            DispatchDecision::Requeue { delay } => delays.push(delay.as_secs()),
            DispatchDecision::Fail { code } => {
                assert_eq!(code, "retries_exhausted");
                assert_eq!(attempt_count, MAX_ATTEMPTS - 1);
            }
            other => panic!("unexpected decision {other:?}"),
        }
    }
    assert_eq!(delays, vec![2, 4]);
}
