//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the database pool, the process-wide request throttle, the parsed
//! config, and the reset-token delivery hook. Cloning is cheap: every field
//! shares its internals.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::account::{LogResetSink, ResetTokenSink};
use crate::throttle::Throttle;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub throttle: Throttle,
    pub config: Arc<AppConfig>,
    pub reset_sink: Arc<dyn ResetTokenSink>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, throttle: Throttle, config: AppConfig) -> Self {
        Self { pool, throttle, config: Arc::new(config), reset_sink: Arc::new(LogResetSink) }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_helpers::test_app_state;
    use crate::throttle::ThrottleConfig;

    #[tokio::test]
    async fn clones_share_throttle() {
        let (state, _clock) = test_app_state();
        let copy = state.clone();
        state.throttle.check("login:1.2.3.4", ThrottleConfig::LOGIN);
        assert_eq!(copy.throttle.len(), 1);
    }

    #[tokio::test]
    async fn config_is_shared_not_copied() {
        let (state, _clock) = test_app_state();
        let copy = state.clone();
        assert!(Arc::ptr_eq(&state.config, &copy.config));
    }
}
