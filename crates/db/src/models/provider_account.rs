//! Provider account and session models.
//!
//! `auth_mode` is a first-class validated field: `password` accounts can be
//! re-authenticated automatically; `cookie` accounts cannot, and a session
//! failure on one is terminal until an operator re-seeds the cookie.

use serde::Serialize;
use sqlx::FromRow;

use fabula_core::error::CoreError;
use fabula_core::types::{DbId, Timestamp};

/// Automatic re-authentication is possible (username/password on file).
pub const AUTH_MODE_PASSWORD: &str = "password";
/// Session is a manually seeded cookie; no automatic re-auth.
pub const AUTH_MODE_COOKIE: &str = "cookie";

/// All valid auth modes.
pub const VALID_AUTH_MODES: &[&str] = &[AUTH_MODE_PASSWORD, AUTH_MODE_COOKIE];

/// A row from the `provider_accounts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProviderAccount {
    pub id: DbId,
    pub provider_id: String,
    /// Stable identifier of the account at the provider (login, org slug).
    pub account_key: String,
    pub auth_mode: String,
    /// Opaque reference into the secret store; never the secret itself.
    pub credentials_ref: Option<String>,
    pub session_token: Option<String>,
    pub session_expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProviderAccount {
    /// Whether this account is eligible for automatic re-authentication.
    pub fn can_reauthenticate(&self) -> bool {
        self.auth_mode == AUTH_MODE_PASSWORD && self.credentials_ref.is_some()
    }
}

/// Validate an auth mode string against the closed set.
pub fn validate_auth_mode(mode: &str) -> Result<(), CoreError> {
    if VALID_AUTH_MODES.contains(&mode) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid auth mode '{mode}'. Must be one of: {}",
            VALID_AUTH_MODES.join(", ")
        )))
    }
}
