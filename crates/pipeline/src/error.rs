//! Pipeline-level error type.

use fabula_core::CoreError;

/// Errors surfaced by intake and the background workers.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}
