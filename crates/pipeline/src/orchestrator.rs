//! Pure lifecycle decisions for the generation state machine.
//!
//! The submission worker and poller translate provider failures into one
//! of the decisions below and then apply it with a compare-and-swap
//! database update. Keeping the decision pure makes the retry policy
//! testable without a database or a provider.

use std::time::Duration;

use fabula_provider::{ErrorClass, ProviderError};

use crate::backoff::{delay_for_attempt, RetryConfig};

/// Hard ceiling on dispatch attempts per generation. Retries reuse the
/// same row; a new attempt never creates a new generation.
pub const MAX_ATTEMPTS: i32 = 3;

/// Error code persisted when the attempt budget runs out.
pub const CODE_RETRIES_EXHAUSTED: &str = "retries_exhausted";

/// What to do with a claimed generation after a dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Re-authenticate the provider session, then retry the dispatch once
    /// within the same claim. Taken at most once per claim.
    RefreshSessionAndRetry,
    /// Return the row to `Created` with the attempt counter bumped and the
    /// next attempt deferred by `delay`.
    Requeue { delay: Duration },
    /// Terminally fail the generation with a structured error code.
    Fail { code: &'static str },
}

/// Decide the fate of a failed dispatch attempt.
///
/// `attempt_count` is the row's counter before this attempt (0 on first
/// dispatch). `reauthed` is whether this claim already spent its one
/// session refresh: a second session-invalid after a fresh login means the
/// account itself is broken, not the token.
pub fn decide_dispatch_failure(
    error: &ProviderError,
    attempt_count: i32,
    reauthed: bool,
    backoff: &RetryConfig,
) -> DispatchDecision {
    match error.classify() {
        ErrorClass::SessionInvalid if !reauthed => DispatchDecision::RefreshSessionAndRetry,
        ErrorClass::SessionInvalid => DispatchDecision::Fail { code: error.code() },
        ErrorClass::Transient => {
            let attempts_used = attempt_count + 1;
            if attempts_used >= MAX_ATTEMPTS {
                DispatchDecision::Fail {
                    code: CODE_RETRIES_EXHAUSTED,
                }
            } else {
                DispatchDecision::Requeue {
                    delay: delay_for_attempt(attempts_used as u32, backoff),
                }
            }
        }
        ErrorClass::Terminal => DispatchDecision::Fail { code: error.code() },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
