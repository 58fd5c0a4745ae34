use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SessionBackend};
use crate::crypto::token::TokenIssuer;
use crate::error::{AppError, Result};
use crate::repositories::session::{MemorySessionStore, RedisSessionStore, SessionStore};
use crate::services::account::{AccountBackend, HttpAccountBackend};
use crate::services::auth::{AuthService, TokenPolicy};

/// The application's state.
///
/// Built once at startup; every dependency is constructed here and handed
/// to the components that use it.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The auth orchestrator, which owns the session store and backend client.
    pub auth: AuthService,
}

impl AppState {
    /// Creates a new `AppState` from configuration, connecting to the
    /// configured session store.
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn SessionStore> = match config.session_backend {
            SessionBackend::Redis => {
                let store = RedisSessionStore::connect(&config.redis_url).await?;
                tracing::info!("✅ Redis Connection Manager initialized (pooled)");
                Arc::new(store)
            }
            SessionBackend::Memory => {
                tracing::warn!("Using in-memory session store; sessions do not survive restarts");
                Arc::new(MemorySessionStore::new())
            }
        };

        let backend = HttpAccountBackend::new(
            config.account_backend_url.clone(),
            Duration::from_millis(config.backend_timeout_ms),
        )
        .map_err(|e| AppError::Internal(e.to_string()))?;
        tracing::info!("✅ Account backend client initialized: {}", config.account_backend_url);

        Ok(Self::with_components(config, store, Arc::new(backend)))
    }

    /// Assembles the state from already-built components.
    pub fn with_components(
        config: &Config,
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn AccountBackend>,
    ) -> Self {
        let issuer = TokenIssuer::new(&config.token_secret);
        let policy = TokenPolicy {
            access_ttl_secs: config.access_token_ttl_secs,
            refresh_ttl_secs: config.refresh_token_ttl_secs,
        };

        AppState {
            config: config.clone(),
            auth: AuthService::new(store, backend, issuer, policy, config.backend_retries),
        }
    }
}
