//! The provider-independent execution interface and its error taxonomy.

use async_trait::async_trait;

use fabula_core::canonical::CanonicalParams;
use fabula_core::operation::{MediaType, OperationType};

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Mandatory three-valued classification of provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The provider session/credentials are no longer valid. Triggers a
    /// single serialized re-authentication, then exactly one retry.
    SessionInvalid,
    /// A temporary condition (rate limit, 5xx, network). Retried with
    /// bounded exponential backoff.
    Transient,
    /// Permanent. The generation fails; no retry.
    Terminal,
}

/// Errors from provider adapters.
///
/// Every variant maps to exactly one [`ErrorClass`]. Anything an adapter
/// cannot confidently classify must land in [`ProviderError::Unexpected`],
/// which is terminal — never silent retry-forever.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected the session token or cookie.
    #[error("Provider session invalid: {0}")]
    SessionInvalid(String),

    /// The account cannot be re-authenticated automatically (cookie-only,
    /// or no credentials on file).
    #[error("Session expired and account is not eligible for re-auth: {0}")]
    ReauthIneligible(String),

    /// The provider asked us to slow down.
    #[error("Provider rate limited: {0}")]
    RateLimited(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Provider request failed: {0}")]
    Network(String),

    /// The provider returned a server-side error.
    #[error("Provider server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    /// The provider rejected the request as invalid.
    #[error("Provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The provider reported the job itself failed.
    #[error("Provider job failed: {0}")]
    JobFailed(String),

    /// A response did not match any shape the adapter knows.
    #[error("Unexpected provider response: {0}")]
    Unexpected(String),
}

impl ProviderError {
    /// Classify this error for retry policy.
    pub fn classify(&self) -> ErrorClass {
        match self {
            ProviderError::SessionInvalid(_) => ErrorClass::SessionInvalid,
            ProviderError::RateLimited(_)
            | ProviderError::Network(_)
            | ProviderError::ServerError { .. } => ErrorClass::Transient,
            // Unclassifiable shapes default to terminal.
            ProviderError::ReauthIneligible(_)
            | ProviderError::Rejected { .. }
            | ProviderError::JobFailed(_)
            | ProviderError::Unexpected(_) => ErrorClass::Terminal,
        }
    }

    /// Stable machine-readable code persisted on failed generations.
    pub fn code(&self) -> &'static str {
        match self {
            ProviderError::SessionInvalid(_) => "session_invalid",
            ProviderError::ReauthIneligible(_) => "reauth_ineligible",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::Network(_) => "network",
            ProviderError::ServerError { .. } => "server_error",
            ProviderError::Rejected { .. } => "rejected",
            ProviderError::JobFailed(_) => "job_failed",
            ProviderError::Unexpected(_) => "unexpected_response",
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A provider's acceptance of a dispatched job.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    /// Provider-assigned job identifier, used for status polling.
    pub provider_job_id: String,
    /// Raw acceptance payload, persisted for debugging.
    pub raw_response: serde_json::Value,
}

/// A completed provider result, typed and media-tagged by the adapter.
///
/// `media_type` is set from the *requested* operation type via
/// [`MediaType::for_operation`] — never from which URL-shaped field the raw
/// payload happens to populate. Several providers reuse a video-shaped field
/// for image results; downstream code must never re-interpret the blob.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub media_type: MediaType,
    pub provider_asset_id: String,
    pub remote_url: String,
    /// Full raw provider payload, persisted as asset metadata.
    pub raw: serde_json::Value,
}

/// Outcome of a single status poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// Still queued or running at the provider.
    Pending,
    /// Finished successfully.
    Completed(ProviderResult),
    /// Finished unsuccessfully.
    Failed(ProviderError),
}

// ---------------------------------------------------------------------------
// The adapter trait
// ---------------------------------------------------------------------------

/// Capability-declared execution interface implemented once per provider.
///
/// Adapters own their session lifecycle: `execute` and `check_status` use
/// whatever credentials are current, and `refresh_session` is the explicit
/// re-authentication hook the orchestrator calls (at most once per logical
/// operation) on a session-invalid failure.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider identifier (matches `generations.provider_id`).
    fn provider_id(&self) -> &'static str;

    /// The operation types this provider can execute.
    fn supported_operations(&self) -> &'static [OperationType];

    /// Whether this adapter declares support for an operation.
    fn supports(&self, op: OperationType) -> bool {
        self.supported_operations().contains(&op)
    }

    /// Dispatch a job. Returns the provider's job handle on acceptance.
    async fn execute(
        &self,
        op: OperationType,
        params: &CanonicalParams,
    ) -> Result<SubmittedJob, ProviderError>;

    /// Poll the provider for the state of a previously submitted job.
    ///
    /// `op` is the originally requested operation type; adapters use it to
    /// tag the result's media type.
    async fn check_status(
        &self,
        op: OperationType,
        provider_job_id: &str,
    ) -> Result<PollOutcome, ProviderError>;

    /// Re-authenticate the adapter's account. Serialized per account by the
    /// session manager; fails with [`ProviderError::ReauthIneligible`] for
    /// cookie-only accounts.
    async fn refresh_session(&self) -> Result<(), ProviderError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_classify_as_session_invalid() {
        let err = ProviderError::SessionInvalid("token expired".into());
        assert_eq!(err.classify(), ErrorClass::SessionInvalid);
    }

    #[test]
    fn throttling_and_server_errors_are_transient() {
        assert_eq!(
            ProviderError::RateLimited("429".into()).classify(),
            ErrorClass::Transient
        );
        assert_eq!(
            ProviderError::Network("connection reset".into()).classify(),
            ErrorClass::Transient
        );
        assert_eq!(
            ProviderError::ServerError {
                status: 503,
                body: "unavailable".into()
            }
            .classify(),
            ErrorClass::Transient
        );
    }

    #[test]
    fn rejections_and_job_failures_are_terminal() {
        assert_eq!(
            ProviderError::Rejected {
                status: 422,
                body: "bad params".into()
            }
            .classify(),
            ErrorClass::Terminal
        );
        assert_eq!(
            ProviderError::JobFailed("nsfw filter".into()).classify(),
            ErrorClass::Terminal
        );
    }

    /// Unclassifiable errors must default to terminal, never to retry.
    #[test]
    fn unexpected_shapes_default_to_terminal() {
        assert_eq!(
            ProviderError::Unexpected("unknown status word".into()).classify(),
            ErrorClass::Terminal
        );
        assert_eq!(
            ProviderError::ReauthIneligible("cookie account".into()).classify(),
            ErrorClass::Terminal
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            ProviderError::SessionInvalid(String::new()).code(),
            "session_invalid"
        );
        assert_eq!(
            ProviderError::RateLimited(String::new()).code(),
            "rate_limited"
        );
        assert_eq!(ProviderError::JobFailed(String::new()).code(), "job_failed");
    }
}
