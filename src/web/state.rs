use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::services::auth_service::AuthProvider;
use crate::storage::ObjectStorage;

/// Shared by every handler; nothing in it changes after startup.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub storage: Arc<dyn ObjectStorage>,
    pub config: Arc<AppConfig>,
    pub auth: Arc<dyn AuthProvider>,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ObjectStorage> {
    fn from_ref(state: &AppState) -> Self {
        state.storage.clone()
    }
}
