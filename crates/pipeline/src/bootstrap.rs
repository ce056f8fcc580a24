//! Provider registry construction shared by the API server and the worker.

use std::sync::Arc;

use fabula_db::repositories::ProviderAccountRepo;
use fabula_db::DbPool;
use fabula_provider::mirage::{self, MirageAdapter, MirageConfig};
use fabula_provider::{registry, ProviderRegistry};

use crate::error::PipelineError;

/// Build the registry of provider adapters and run the startup self-check.
///
/// Sessions are seeded from stored `provider_accounts` rows so a restart
/// does not force a re-login. The self-check fails fast on any operation
/// type without a canonicalization rule or a capable adapter.
pub async fn build_registry(pool: &DbPool) -> Result<Arc<ProviderRegistry>, PipelineError> {
    let mut providers = ProviderRegistry::new();

    let adapter = MirageAdapter::new(MirageConfig::from_env());
    match ProviderAccountRepo::find_for_provider(pool, mirage::PROVIDER_ID).await? {
        Some(account) => {
            adapter
                .seed_session(account.session_token.clone(), account.session_expires_at)
                .await;
            if !account.can_reauthenticate() {
                tracing::warn!(
                    provider_id = mirage::PROVIDER_ID,
                    account_key = %account.account_key,
                    "Account is not eligible for automatic re-auth; a session \
                     failure will require operator intervention",
                );
            }
            tracing::info!(
                provider_id = mirage::PROVIDER_ID,
                account_key = %account.account_key,
                has_session = account.session_token.is_some(),
                "Provider account loaded",
            );
        }
        None => {
            tracing::warn!(
                provider_id = mirage::PROVIDER_ID,
                "No provider account configured; dispatches will fail until \
                 one is seeded",
            );
        }
    }
    providers.register(Arc::new(adapter));

    registry::startup_check(&providers)?;
    tracing::info!("Provider registry self-check passed");

    Ok(Arc::new(providers))
}
