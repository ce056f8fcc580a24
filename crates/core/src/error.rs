//! Domain error type shared across the workspace.

use crate::operation::OperationType;
use crate::types::DbId;

/// Errors produced by core domain logic.
///
/// Submission-time errors (`UnmappedOperationKind`, `MissingRequiredField`)
/// are surfaced synchronously to the caller; they never reach a provider.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The request `kind` has no entry in the operation registry.
    ///
    /// There is deliberately no fallback operation type: an unknown kind
    /// is a configuration error, not a request to be routed somewhere
    /// plausible.
    #[error("Unmapped operation kind: \"{0}\"")]
    UnmappedOperationKind(String),

    /// A field required by the resolved operation type is absent from the
    /// structured parameters.
    #[error("Missing required field \"{field}\" for operation {operation}")]
    MissingRequiredField {
        field: &'static str,
        operation: OperationType,
    },

    /// A caller-supplied value failed validation.
    #[error("{0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// The request conflicts with current state (e.g. cancelling a
    /// terminal generation).
    #[error("{0}")]
    Conflict(String),

    /// An invariant was violated internally.
    #[error("{0}")]
    Internal(String),
}
