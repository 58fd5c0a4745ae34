//! Client for the internal account backend.
//!
//! The client is a thin mapping from request to outcome: it never retries,
//! never validates credentials and never interprets the backend's result
//! codes beyond decoding them into [`AuthOutcome`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::auth::{AccountReply, AccountStatus, AuthOutcome, IssuedToken};

/// Transport-level failures talking to the account backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("account backend deadline exceeded")]
    Timeout,

    #[error("account backend unavailable: {0}")]
    Unavailable(String),

    #[error("account backend protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Whether the same call may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Timeout | BackendError::Unavailable(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_connect() || err.is_request() {
            BackendError::Unavailable(err.to_string())
        } else if err.is_decode() {
            BackendError::Protocol(err.to_string())
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}

/// Account backend operations the auth flows rely on.
#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AccountReply, BackendError>;

    async fn register(&self, email: &str, password: &str) -> Result<AccountReply, BackendError>;

    /// Confirms the user still exists and reports their current state.
    async fn validate(&self, user_id: u64) -> Result<AccountStatus, BackendError>;
}

#[derive(Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ValidateRequest {
    id: u64,
}

#[derive(Deserialize, Debug, Default)]
struct WireToken {
    #[serde(default)]
    value: String,
    #[serde(default)]
    age: i64,
}

impl From<WireToken> for IssuedToken {
    fn from(token: WireToken) -> Self {
        Self {
            value: token.value,
            age: token.age,
        }
    }
}

/// Reply of `login`, `register` and `validate`.
///
/// `errorCode` has no default: a reply without one is a protocol error
/// rather than an implicit success.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireReply {
    #[serde(default)]
    id: u64,
    #[serde(default)]
    access_token: Option<WireToken>,
    #[serde(default)]
    refresh_token: Option<WireToken>,
    #[serde(default)]
    profile_id: u64,
    #[serde(default)]
    is_validated: bool,
    error_code: i32,
}

impl From<WireReply> for AccountReply {
    fn from(reply: WireReply) -> Self {
        Self {
            user_id: reply.id,
            profile_id: reply.profile_id,
            access_token: reply.access_token.unwrap_or_default().into(),
            refresh_token: reply.refresh_token.unwrap_or_default().into(),
            is_validated: reply.is_validated,
            outcome: AuthOutcome::from_code(reply.error_code),
        }
    }
}

impl From<WireReply> for AccountStatus {
    fn from(reply: WireReply) -> Self {
        Self {
            user_id: reply.id,
            profile_id: reply.profile_id,
            is_validated: reply.is_validated,
            outcome: AuthOutcome::from_code(reply.error_code),
        }
    }
}

/// JSON-over-HTTP implementation of [`AccountBackend`].
#[derive(Clone)]
pub struct HttpAccountBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccountBackend {
    /// Creates a client whose every call is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn call<B: Serialize + Sync>(&self, method: &str, body: &B) -> Result<WireReply, BackendError> {
        let url = format!("{}/rpc/{}", self.base_url, method);
        tracing::debug!(method, "account backend call");

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(BackendError::Unavailable(format!("{} returned {}", method, status)));
        }
        if !status.is_success() {
            return Err(BackendError::Protocol(format!("{} returned {}", method, status)));
        }

        let reply = response.json::<WireReply>().await?;
        tracing::debug!(method, error_code = reply.error_code, "account backend reply");
        Ok(reply)
    }
}

#[async_trait]
impl AccountBackend for HttpAccountBackend {
    async fn login(&self, email: &str, password: &str) -> Result<AccountReply, BackendError> {
        self.call("login", &CredentialsRequest { email, password })
            .await
            .map(AccountReply::from)
    }

    async fn register(&self, email: &str, password: &str) -> Result<AccountReply, BackendError> {
        self.call("register", &CredentialsRequest { email, password })
            .await
            .map(AccountReply::from)
    }

    async fn validate(&self, user_id: u64) -> Result<AccountStatus, BackendError> {
        self.call("validate", &ValidateRequest { id: user_id })
            .await
            .map(AccountStatus::from)
    }
}
