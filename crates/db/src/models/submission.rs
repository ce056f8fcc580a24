//! Provider submission model: the 1:1 record of an in-flight generation at
//! its provider. Owned by the submission/polling workers; never mutated by
//! any other component.

use serde::Serialize;
use sqlx::FromRow;

use fabula_core::types::{DbId, Timestamp};

/// A row from the `provider_submissions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProviderSubmission {
    pub id: DbId,
    /// 1:1 with a `generations` row (unique index).
    pub generation_id: DbId,
    /// Provider-assigned job identifier.
    pub provider_job_id: String,
    /// Raw provider response blob from the accept call.
    pub raw_response: serde_json::Value,
    pub last_polled_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// DTO for recording a provider's acceptance of a job.
#[derive(Debug, Clone)]
pub struct CreateSubmission {
    pub generation_id: DbId,
    pub provider_job_id: String,
    pub raw_response: serde_json::Value,
}
