use std::sync::Arc;

use fabula_provider::ProviderRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: fabula_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The closed set of registered provider adapters.
    pub providers: Arc<ProviderRegistry>,
}
