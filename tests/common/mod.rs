#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use zeroize::Zeroizing;

use authgate::config::{Config, SessionBackend};
use authgate::models::auth::{AccountReply, AccountStatus, AuthOutcome, AuthRequest, IssuedToken};
use authgate::models::session::Session;
use authgate::repositories::session::{MemorySessionStore, SessionStore, StoreError};
use authgate::services::account::{AccountBackend, BackendError};
use authgate::state::AppState;

pub const USER_ID: u64 = 7;
pub const PROFILE_ID: u64 = 70;

pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        session_backend: SessionBackend::Memory,
        account_backend_url: "http://127.0.0.1:9".to_string(),
        backend_timeout_ms: 500,
        backend_retries: 1,
        token_secret: Zeroizing::new(vec![0x5a; 32]),
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 3600,
    }
}

/// Current time truncated to whole seconds, matching token `iat` precision.
pub fn now_secs() -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap()
}

pub fn credentials() -> AuthRequest {
    AuthRequest {
        email: "a@x.com".to_string(),
        password: "p".to_string(),
    }
}

pub fn ok_reply() -> AccountReply {
    reply_with(AuthOutcome::Ok)
}

pub fn reply_with(outcome: AuthOutcome) -> AccountReply {
    AccountReply {
        user_id: USER_ID,
        profile_id: PROFILE_ID,
        access_token: IssuedToken {
            value: "backend-access".to_string(),
            age: 900,
        },
        refresh_token: IssuedToken {
            value: "backend-refresh".to_string(),
            age: 3600,
        },
        is_validated: true,
        outcome,
    }
}

pub fn status_with(outcome: AuthOutcome) -> AccountStatus {
    AccountStatus {
        user_id: USER_ID,
        profile_id: PROFILE_ID,
        is_validated: true,
        outcome,
    }
}

/// Account backend returning queued results, falling back to success.
#[derive(Default)]
pub struct ScriptedBackend {
    login: Mutex<VecDeque<Result<AccountReply, BackendError>>>,
    register: Mutex<VecDeque<Result<AccountReply, BackendError>>>,
    validate: Mutex<VecDeque<Result<AccountStatus, BackendError>>>,
    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_login(self, result: Result<AccountReply, BackendError>) -> Self {
        self.login.lock().unwrap().push_back(result);
        self
    }

    pub fn with_register(self, result: Result<AccountReply, BackendError>) -> Self {
        self.register.lock().unwrap().push_back(result);
        self
    }

    pub fn with_validate(self, result: Result<AccountStatus, BackendError>) -> Self {
        self.validate.lock().unwrap().push_back(result);
        self
    }
}

#[async_trait]
impl AccountBackend for ScriptedBackend {
    async fn login(&self, _email: &str, _password: &str) -> Result<AccountReply, BackendError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login.lock().unwrap().pop_front().unwrap_or_else(|| Ok(ok_reply()))
    }

    async fn register(&self, _email: &str, _password: &str) -> Result<AccountReply, BackendError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.register.lock().unwrap().pop_front().unwrap_or_else(|| Ok(ok_reply()))
    }

    async fn validate(&self, _user_id: u64) -> Result<AccountStatus, BackendError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validate
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(status_with(AuthOutcome::Ok)))
    }
}

/// Memory store whose operations can be switched to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemorySessionStore,
    pub fail_puts: AtomicBool,
    pub offline: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn put(&self, user_id: u64, session: &Session) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.put(user_id, session).await
    }

    async fn get(&self, user_id: u64) -> Result<Option<Session>, StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.get(user_id).await
    }

    async fn delete(&self, user_id: u64) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.delete(user_id).await
    }
}

pub fn app_state(store: Arc<dyn SessionStore>, backend: Arc<dyn AccountBackend>) -> AppState {
    AppState::with_components(&test_config(), store, backend)
}
