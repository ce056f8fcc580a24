//! REST adapter for the Mirage media-generation provider.
//!
//! Mirage exposes a submit/poll HTTP API:
//! - `POST /v1/jobs` queues a job and returns a job id
//! - `GET  /v1/jobs/{id}` reports queued/running/succeeded/failed
//! - `POST /v1/auth/login` exchanges account credentials for a session token
//!
//! Mirage reuses a `video_url`-shaped result field for some image
//! operations, so the poll parser tags results strictly from the requested
//! operation type and only treats the URL fields as a place to find bytes.

use async_trait::async_trait;
use serde::Deserialize;

use fabula_core::canonical::CanonicalParams;
use fabula_core::operation::{MediaType, OperationType};

use crate::adapter::{
    PollOutcome, ProviderAdapter, ProviderError, ProviderResult, SubmittedJob,
};
use crate::session::SessionManager;

/// Stable provider identifier.
pub const PROVIDER_ID: &str = "mirage";

/// Account credentials for password-mode accounts.
#[derive(Debug, Clone)]
pub struct MirageCredentials {
    pub username: String,
    pub password: String,
}

/// Connection settings for one Mirage account.
#[derive(Debug, Clone)]
pub struct MirageConfig {
    /// Base HTTP URL, e.g. `https://api.mirage.example`.
    pub base_url: String,
    /// Present for password-mode accounts; `None` means the session was
    /// seeded from a cookie and cannot be refreshed automatically.
    pub credentials: Option<MirageCredentials>,
}

impl MirageConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var           | Default                      |
    /// |-------------------|------------------------------|
    /// | `MIRAGE_BASE_URL` | `https://api.mirage.example` |
    /// | `MIRAGE_USERNAME` | (unset)                      |
    /// | `MIRAGE_PASSWORD` | (unset)                      |
    pub fn from_env() -> Self {
        let base_url = std::env::var("MIRAGE_BASE_URL")
            .unwrap_or_else(|_| "https://api.mirage.example".into());
        let credentials = match (
            std::env::var("MIRAGE_USERNAME"),
            std::env::var("MIRAGE_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(MirageCredentials { username, password }),
            _ => None,
        };
        Self {
            base_url,
            credentials,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Response from `POST /v1/jobs`.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Response from `POST /v1/auth/login`.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Response from `GET /v1/jobs/{id}`.
///
/// The result URL may arrive under either `video_url` or `image_url`
/// depending on backend version, independent of the actual media kind.
#[derive(Debug, Deserialize)]
pub struct JobStatusResponse {
    pub status: String,
    pub asset_id: Option<String>,
    pub video_url: Option<String>,
    pub image_url: Option<String>,
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// HTTP adapter for one Mirage account.
pub struct MirageAdapter {
    client: reqwest::Client,
    config: MirageConfig,
    session: SessionManager,
}

impl MirageAdapter {
    pub fn new(config: MirageConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            session: SessionManager::new(),
        }
    }

    /// Seed the session from a previously stored token.
    pub async fn seed_session(
        &self,
        token: Option<String>,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) {
        self.session.seed(token, expires_at).await;
    }

    async fn login(
        client: &reqwest::Client,
        base_url: &str,
        credentials: &MirageCredentials,
    ) -> Result<(String, Option<chrono::DateTime<chrono::Utc>>), ProviderError> {
        let body = serde_json::json!({
            "username": credentials.username,
            "password": credentials.password,
        });
        let response = client
            .post(format!("{base_url}/v1/auth/login"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let login: LoginResponse = parse_response(response).await?;
        Ok((login.token, login.expires_at))
    }

    /// Current bearer token, or a session-invalid error if none is held.
    async fn bearer(&self) -> Result<(String, crate::session::SessionSnapshot), ProviderError> {
        let snapshot = self.session.snapshot().await;
        match &snapshot.token {
            Some(token) => Ok((token.clone(), snapshot)),
            None => Err(ProviderError::SessionInvalid(
                "no session token held".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MirageAdapter {
    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn supported_operations(&self) -> &'static [OperationType] {
        OperationType::ALL
    }

    async fn execute(
        &self,
        op: OperationType,
        params: &CanonicalParams,
    ) -> Result<SubmittedJob, ProviderError> {
        let (token, _) = self.bearer().await?;
        let body = serde_json::json!({
            "operation": op.kind(),
            "params": params,
        });

        let response = self
            .client
            .post(format!("{}/v1/jobs", self.config.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let raw = read_success_json(response).await?;
        let submit: SubmitResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::Unexpected(format!("submit response: {e}")))?;

        Ok(SubmittedJob {
            provider_job_id: submit.job_id,
            raw_response: raw,
        })
    }

    async fn check_status(
        &self,
        op: OperationType,
        provider_job_id: &str,
    ) -> Result<PollOutcome, ProviderError> {
        let (token, _) = self.bearer().await?;
        let response = self
            .client
            .get(format!(
                "{}/v1/jobs/{provider_job_id}",
                self.config.base_url
            ))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let raw = read_success_json(response).await?;
        let status: JobStatusResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::Unexpected(format!("status response: {e}")))?;

        parse_poll_response(op, &status, raw)
    }

    async fn refresh_session(&self) -> Result<(), ProviderError> {
        let credentials = self.config.credentials.as_ref().ok_or_else(|| {
            ProviderError::ReauthIneligible(
                "account has no stored credentials (cookie-only)".to_string(),
            )
        })?;

        let snapshot = self.session.snapshot().await;
        let client = self.client.clone();
        let base_url = self.config.base_url.clone();
        let credentials = credentials.clone();
        self.session
            .refresh_if_stale(&snapshot, move || async move {
                Self::login(&client, &base_url, &credentials).await
            })
            .await?;

        tracing::info!(provider_id = PROVIDER_ID, "Provider session refreshed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

/// Map an HTTP status to the three-valued error taxonomy and return the
/// body JSON on success.
async fn read_success_json(
    response: reqwest::Response,
) -> Result<serde_json::Value, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::Unexpected(format!("non-JSON body: {e}")));
    }

    let code = status.as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());

    Err(classify_http_status(code, body))
}

/// Mirage status-code mapping. 419 is Mirage's "session expired".
pub fn classify_http_status(status: u16, body: String) -> ProviderError {
    match status {
        401 | 419 => ProviderError::SessionInvalid(body),
        429 => ProviderError::RateLimited(body),
        500..=599 => ProviderError::ServerError { status, body },
        _ => ProviderError::Rejected { status, body },
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let raw = read_success_json(response).await?;
    serde_json::from_value(raw).map_err(|e| ProviderError::Unexpected(e.to_string()))
}

/// Interpret a job status payload as a poll outcome.
///
/// The media type is taken from the requested operation, not from the
/// payload shape: Mirage populates `video_url` for some image results.
pub fn parse_poll_response(
    op: OperationType,
    status: &JobStatusResponse,
    raw: serde_json::Value,
) -> Result<PollOutcome, ProviderError> {
    match status.status.as_str() {
        "queued" | "running" => Ok(PollOutcome::Pending),
        "succeeded" => {
            let remote_url = status
                .video_url
                .as_deref()
                .or(status.image_url.as_deref())
                .ok_or_else(|| {
                    ProviderError::Unexpected("succeeded job with no result URL".to_string())
                })?;
            let provider_asset_id = status.asset_id.clone().ok_or_else(|| {
                ProviderError::Unexpected("succeeded job with no asset id".to_string())
            })?;
            Ok(PollOutcome::Completed(ProviderResult {
                media_type: MediaType::for_operation(op),
                provider_asset_id,
                remote_url: remote_url.to_string(),
                raw,
            }))
        }
        "failed" => Ok(PollOutcome::Failed(ProviderError::JobFailed(
            status
                .error
                .clone()
                .unwrap_or_else(|| "provider reported failure without detail".to_string()),
        ))),
        other => Err(ProviderError::Unexpected(format!(
            "unknown job status \"{other}\""
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
