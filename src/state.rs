use crate::{config::Config, services::access::RoleRegistry};
use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Role codes loaded once at startup; read-only afterwards.
    pub roles: Arc<RoleRegistry>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<RoleRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.roles.clone()
    }
}
