//! Request intake: resolve, canonicalize, fingerprint, dedup, persist.
//!
//! Intake is the only code path that creates generation rows. A request
//! either comes back with a freshly created `Created` row or with the
//! already-active row that owns the same fingerprint.

use fabula_core::canonical;
use fabula_core::hashing::{reproducible_hash, SeedStrategy};
use fabula_core::operation::OperationType;
use fabula_core::social::{clamp, ContextCeiling, SocialContext};
use fabula_core::CoreError;
use fabula_db::models::generation::{CreateGeneration, Generation};
use fabula_db::repositories::GenerationRepo;
use fabula_db::DbPool;
use fabula_provider::{ProviderAdapter, ProviderRegistry};

use crate::error::PipelineError;

/// A fully specified generation request.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    /// Canonical operation kind string (e.g. `video_extend`).
    pub kind: String,
    /// Provider-styled structured parameters.
    pub params: serde_json::Value,
    /// Opaque input references (asset ids or URLs) used for lineage and
    /// fingerprinting.
    pub inputs: Vec<String>,
    pub seed: SeedStrategy,
    pub requested_context: SocialContext,
    pub world_ceiling: ContextCeiling,
    pub user_ceiling: ContextCeiling,
    /// Pin the request to a specific provider instead of registry routing.
    pub provider_id: Option<String>,
    pub parent_generation_id: Option<i64>,
}

/// The outcome of a submitted request.
#[derive(Debug)]
pub struct IntakeOutcome {
    pub generation: Generation,
    /// `true` when an existing active row satisfied the request.
    pub deduplicated: bool,
    /// `true` when the social context was reduced to fit a ceiling.
    pub context_clamped: bool,
}

/// Submit a generation request.
///
/// Dedup is advisory-read then insert: the unique partial index on active
/// fingerprints is the authority, and a losing concurrent insert re-reads
/// the winner instead of failing.
pub async fn submit(
    pool: &DbPool,
    registry: &ProviderRegistry,
    request: IntakeRequest,
) -> Result<IntakeOutcome, PipelineError> {
    let op = OperationType::resolve(&request.kind)?;

    let adapter = match &request.provider_id {
        Some(id) => {
            let adapter = registry.get(id).ok_or_else(|| {
                CoreError::Validation(format!("Unknown provider \"{id}\""))
            })?;
            if !adapter.supports(op) {
                return Err(CoreError::Validation(format!(
                    "Provider \"{id}\" does not support {op}"
                ))
                .into());
            }
            adapter
        }
        None => registry.adapter_for(op)?,
    };
    let provider_id = adapter.provider_id();

    let params = canonical::canonicalize(op, &request.params, provider_id)?;

    // Clamp at intake: what the provider will see.
    let (context, context_clamped) = clamp(
        request.requested_context,
        request.world_ceiling,
        request.user_ceiling,
    );
    if context_clamped {
        tracing::info!(
            kind = %op,
            requested_tier = request.requested_context.relationship_tier,
            requested_intimacy = request.requested_context.intimacy_level,
            resolved_tier = context.relationship_tier,
            resolved_intimacy = context.intimacy_level,
            "Social context clamped at intake",
        );
    }

    let hash = reproducible_hash(op, &params, &request.inputs, &request.seed);

    // Timestamp-seeded requests are explicitly unique; skip the lookup.
    if request.seed.is_deduplicable() {
        if let Some(existing) = GenerationRepo::find_active_by_hash(pool, &hash).await? {
            tracing::info!(
                generation_id = existing.id,
                kind = %op,
                "Request deduplicated against active generation",
            );
            return Ok(IntakeOutcome {
                generation: existing,
                deduplicated: true,
                context_clamped,
            });
        }
    }

    // Clamp again at persistence. The resolved context re-clamps to itself;
    // anything else indicates a ceiling changed mid-request and is logged.
    let (persisted_context, reclamped) =
        clamp(context, request.world_ceiling, request.user_ceiling);
    if reclamped {
        tracing::warn!(
            kind = %op,
            "Social context clamped again at persistence",
        );
    }

    let create = CreateGeneration {
        operation_type: op.kind().to_string(),
        provider_id: provider_id.to_string(),
        inputs: serde_json::json!(request.inputs),
        canonical_params: serde_json::to_value(&params)
            .map_err(|e| CoreError::Internal(e.to_string()))?,
        reproducible_hash: hash.clone(),
        relationship_tier: persisted_context.relationship_tier,
        intimacy_level: persisted_context.intimacy_level,
        parent_generation_id: request.parent_generation_id,
    };

    match GenerationRepo::create(pool, &create).await {
        Ok(generation) => {
            tracing::info!(
                generation_id = generation.id,
                kind = %op,
                provider_id,
                "Generation created",
            );
            Ok(IntakeOutcome {
                generation,
                deduplicated: false,
                context_clamped,
            })
        }
        // Lost the insert race on the active-fingerprint index: another
        // request with the same fingerprint got there first.
        Err(e) if is_unique_violation(&e) && request.seed.is_deduplicable() => {
            let winner = GenerationRepo::find_active_by_hash(pool, &hash)
                .await?
                .ok_or_else(|| {
                    CoreError::Internal(
                        "Fingerprint conflict but no active row found".to_string(),
                    )
                })?;
            tracing::info!(
                generation_id = winner.id,
                kind = %op,
                "Concurrent duplicate resolved to existing generation",
            );
            Ok(IntakeOutcome {
                generation: winner,
                deduplicated: true,
                context_clamped,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Postgres unique-violation check (SQLSTATE 23505).
fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}
