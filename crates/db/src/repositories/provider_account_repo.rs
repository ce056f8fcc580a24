//! Repository for the `provider_accounts` table.

use sqlx::PgPool;

use fabula_core::types::{DbId, Timestamp};

use crate::models::provider_account::ProviderAccount;

/// Column list for `provider_accounts` queries.
const COLUMNS: &str = "\
    id, provider_id, account_key, auth_mode, credentials_ref, \
    session_token, session_expires_at, created_at, updated_at";

/// Provides operations for provider account/session rows.
pub struct ProviderAccountRepo;

impl ProviderAccountRepo {
    /// Find the account used for a provider.
    ///
    /// One account per provider for now; picks the most recently updated
    /// if several exist.
    pub async fn find_for_provider(
        pool: &PgPool,
        provider_id: &str,
    ) -> Result<Option<ProviderAccount>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM provider_accounts \
             WHERE provider_id = $1 \
             ORDER BY updated_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ProviderAccount>(&query)
            .bind(provider_id)
            .fetch_optional(pool)
            .await
    }

    /// Store a freshly obtained session token.
    pub async fn store_session(
        pool: &PgPool,
        id: DbId,
        session_token: &str,
        expires_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE provider_accounts \
             SET session_token = $2, session_expires_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(session_token)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Explicitly invalidate a stored session.
    pub async fn clear_session(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE provider_accounts \
             SET session_token = NULL, session_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
