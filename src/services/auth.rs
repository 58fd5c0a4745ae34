use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;

use crate::crypto::token::{TokenIssuer, tokens_match};
use crate::error::{AppError, Result};
use crate::models::auth::{AccountReply, AuthOutcome, AuthRequest, LoginResponse, mask_email};
use crate::models::session::Session;
use crate::models::token::{MAX_TOKEN_AGE_SECS, TokenKind};
use crate::repositories::session::SessionStore;
use crate::services::account::{AccountBackend, BackendError};
use crate::services::translator::translate;

/// Token lifetimes used when the account backend does not supply a positive one.
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

fn positive_or(age: i64, fallback: i64) -> i64 {
    if age > 0 { age } else { fallback }
}

/// Orchestrates the login, register, refresh and logout flows.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn AccountBackend>,
    issuer: TokenIssuer,
    policy: TokenPolicy,
    backend_retries: u32,
}

impl AuthService {
    /// Creates a new `AuthService`.
    ///
    /// # Arguments
    ///
    /// * `store` - Where sessions are persisted.
    /// * `backend` - The account backend client.
    /// * `issuer` - Signs and verifies credentials.
    /// * `policy` - Fallback token lifetimes.
    /// * `backend_retries` - Extra attempts after a retryable backend failure.
    pub fn new(
        store: Arc<dyn SessionStore>,
        backend: Arc<dyn AccountBackend>,
        issuer: TokenIssuer,
        policy: TokenPolicy,
        backend_retries: u32,
    ) -> Self {
        Self {
            store,
            backend,
            issuer,
            policy,
            backend_retries,
        }
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Authenticates against the account backend and opens a session.
    ///
    /// Tokens are returned only once the session has been persisted.
    pub async fn login(&self, request: &AuthRequest, now: DateTime<Utc>) -> Result<LoginResponse> {
        tracing::info!("🔐 Login attempt: {}", mask_email(&request.email));

        let reply = self
            .with_retries("login", || {
                self.backend.login(&request.email, &request.password)
            })
            .await?;

        self.open_session(reply, now).await
    }

    /// Registers a new account and opens a session for it.
    pub async fn register(
        &self,
        request: &AuthRequest,
        now: DateTime<Utc>,
    ) -> Result<LoginResponse> {
        tracing::info!("📝 Register attempt: {}", mask_email(&request.email));

        let reply = self
            .with_retries("register", || {
                self.backend.register(&request.email, &request.password)
            })
            .await?;

        self.open_session(reply, now).await
    }

    /// Exchanges a refresh token for a new token pair.
    ///
    /// The refresh token must be unexpired and must be the one currently
    /// stored for its user; anything else is rejected rather than
    /// re-authenticated.
    pub async fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<LoginResponse> {
        let verified = self
            .issuer
            .verify(refresh_token, TokenKind::Refresh, now)
            .map_err(|e| {
                tracing::warn!("❌ Refresh token rejected: {}", e);
                AppError::InvalidCredential
            })?;
        let user_id = verified.user_id;

        let session = self.store.get(user_id).await.map_err(|e| {
            tracing::error!("❌ Session lookup failed for user {}: {}", user_id, e);
            AppError::from(e)
        })?;
        let session = session.ok_or_else(|| {
            tracing::warn!("❌ No session for user {} on refresh", user_id);
            AppError::Revoked
        })?;

        if !tokens_match(session.refresh_token.value(), refresh_token)
            || session.refresh_token.is_expired_at(now)
        {
            tracing::warn!("❌ Refresh token superseded for user {}", user_id);
            return Err(AppError::Revoked);
        }

        let status = self
            .with_retries("validate", || self.backend.validate(user_id))
            .await?;

        if status.outcome == AuthOutcome::NotFound {
            tracing::warn!("Account {} no longer exists, dropping session", user_id);
            self.store.delete(user_id).await?;
        }
        translate(status.outcome)?;

        let renewed = self.mint_session(
            user_id,
            session.profile_id,
            status.is_validated,
            positive_or(session.access_token.age(), self.policy.access_ttl_secs),
            positive_or(session.refresh_token.age(), self.policy.refresh_ttl_secs),
            now,
        )?;
        self.persist(&renewed).await?;

        tracing::info!("✅ Session refreshed for user: {}", user_id);
        Ok(LoginResponse::from(&renewed))
    }

    /// Ends the user's session. Logging out twice is not an error.
    pub async fn logout(&self, user_id: u64) -> Result<()> {
        self.store.delete(user_id).await.map_err(|e| {
            tracing::error!("❌ Session delete failed for user {}: {}", user_id, e);
            AppError::from(e)
        })?;

        tracing::info!("✅ Session deleted for user: {}", user_id);
        Ok(())
    }

    async fn open_session(&self, reply: AccountReply, now: DateTime<Utc>) -> Result<LoginResponse> {
        translate(reply.outcome)?;

        let longest = reply.access_token.age.max(reply.refresh_token.age);
        if longest > MAX_TOKEN_AGE_SECS {
            tracing::error!(
                "❌ Backend reported out-of-range token age {} for user {}",
                longest,
                reply.user_id
            );
            return Err(AppError::Internal(format!("token age out of range: {}", longest)));
        }

        if reply.access_token.age <= 0 || reply.refresh_token.age <= 0 {
            tracing::warn!(
                "Backend reported non-positive token age for user {}, using configured lifetimes",
                reply.user_id
            );
        }

        let session = self.mint_session(
            reply.user_id,
            reply.profile_id,
            reply.is_validated,
            positive_or(reply.access_token.age, self.policy.access_ttl_secs),
            positive_or(reply.refresh_token.age, self.policy.refresh_ttl_secs),
            now,
        )?;
        self.persist(&session).await?;

        tracing::info!("✅ User logged in: {}", session.user_id);
        Ok(LoginResponse::from(&session))
    }

    fn mint_session(
        &self,
        user_id: u64,
        profile_id: u64,
        is_validated: bool,
        access_age: i64,
        refresh_age: i64,
        now: DateTime<Utc>,
    ) -> Result<Session> {
        let access_token = self
            .issuer
            .issue(user_id, profile_id, TokenKind::Access, access_age, now)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let refresh_token = self
            .issuer
            .issue(user_id, profile_id, TokenKind::Refresh, refresh_age, now)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Session {
            user_id,
            profile_id,
            access_token,
            refresh_token,
            is_validated,
        })
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        self.store.put(session.user_id, session).await.map_err(|e| {
            tracing::error!(
                "❌ Session persist failed for user {}, withholding tokens: {}",
                session.user_id,
                e
            );
            AppError::from(e)
        })
    }

    async fn with_retries<T, F, Fut>(
        &self,
        op: &'static str,
        mut call: F,
    ) -> std::result::Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, BackendError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < self.backend_retries => {
                    attempt += 1;
                    tracing::warn!(op, attempt, error = %e, "retrying account backend call");
                }
                Err(e) => {
                    tracing::error!(op, error = %e, "account backend call failed");
                    return Err(e);
                }
                ok => return ok,
            }
        }
    }
}
