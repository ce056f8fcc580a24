//! Per-account session ownership.
//!
//! A provider account's session is owned by exactly one [`SessionManager`]
//! instance. Refresh is explicit (never implicit refresh-on-read) and
//! serialized behind a mutex: when several in-flight jobs hit a
//! session-invalid failure at once, only the first one actually
//! re-authenticates — the rest observe the advanced epoch and reuse the
//! fresh token.

use std::future::Future;

use tokio::sync::Mutex;

use fabula_core::types::Timestamp;

use crate::adapter::ProviderError;

/// A point-in-time view of the session used for a provider call.
///
/// The epoch lets a failed caller prove which session it was using; a
/// refresh request carrying a stale epoch is satisfied from the current
/// session without another re-auth round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub epoch: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    expires_at: Option<Timestamp>,
    epoch: u64,
}

/// Owns one provider account's session token.
#[derive(Debug, Default)]
pub struct SessionManager {
    state: Mutex<SessionState>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the manager with an already-stored session (e.g. loaded from
    /// the `provider_accounts` row at startup).
    pub async fn seed(&self, token: Option<String>, expires_at: Option<Timestamp>) {
        let mut state = self.state.lock().await;
        state.token = token;
        state.expires_at = expires_at;
        state.epoch += 1;
    }

    /// Snapshot the current session for use in a provider call.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            token: state.token.clone(),
            epoch: state.epoch,
        }
    }

    /// Explicitly drop the current session.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.token = None;
        state.expires_at = None;
        state.epoch += 1;
    }

    /// Refresh the session unless someone already did.
    ///
    /// `stale` is the snapshot the failing call was made with. If the
    /// epoch has advanced since, the refresh performed by the winner is
    /// reused and `authenticate` is not called. Otherwise `authenticate`
    /// runs while the lock is held, so concurrent failures against the
    /// same account serialize into a single re-auth.
    pub async fn refresh_if_stale<F, Fut>(
        &self,
        stale: &SessionSnapshot,
        authenticate: F,
    ) -> Result<String, ProviderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Option<Timestamp>), ProviderError>>,
    {
        let mut state = self.state.lock().await;

        if state.epoch != stale.epoch {
            if let Some(token) = &state.token {
                return Ok(token.clone());
            }
            // The newer session was invalidated too; fall through to
            // authenticate under the same lock.
        }

        let (token, expires_at) = authenticate().await?;
        state.token = Some(token.clone());
        state.expires_at = expires_at;
        state.epoch += 1;
        Ok(token)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
