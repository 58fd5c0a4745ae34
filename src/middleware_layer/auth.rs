use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::{
    crypto::token::{TokenIssuer, VerifiedToken, tokens_match},
    error::AppError,
    models::{session::AuthIdentity, token::TokenKind},
    repositories::session::SessionStore,
    state::AppState,
};

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingCredential,
    InvalidCredential,
    RevokedCredential,
}

impl From<RejectReason> for AppError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::MissingCredential => AppError::MissingCredential,
            RejectReason::InvalidCredential => AppError::InvalidCredential,
            RejectReason::RevokedCredential => AppError::Revoked,
        }
    }
}

/// Progress of a single request through authentication.
#[derive(Debug)]
pub enum AuthState {
    Unauthenticated,
    TokenPresent(String),
    TokenValidated(VerifiedToken),
    Authenticated(AuthIdentity),
    Rejected(RejectReason),
}

/// Extracts the bearer token from an `Authorization` header.
///
/// # Arguments
///
/// * `header` - The raw header value, if any.
///
/// # Returns
///
/// An `Option` containing the token if the header carries a non-empty one.
fn extract_bearer_token(header: Option<&HeaderValue>) -> Option<String> {
    let value = header?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Runs the authentication state machine for one request.
///
/// Store failures propagate as transient errors and are never reported as
/// a rejected credential. Session state is only read.
pub async fn authenticate(
    store: &dyn SessionStore,
    issuer: &TokenIssuer,
    header: Option<&HeaderValue>,
    now: DateTime<Utc>,
) -> Result<AuthIdentity, AppError> {
    let mut state = AuthState::Unauthenticated;

    loop {
        state = match state {
            AuthState::Unauthenticated => match extract_bearer_token(header) {
                Some(token) => AuthState::TokenPresent(token),
                None => {
                    tracing::warn!("❌ No bearer token found");
                    AuthState::Rejected(RejectReason::MissingCredential)
                }
            },

            AuthState::TokenPresent(raw) => match issuer.verify(&raw, TokenKind::Access, now) {
                Ok(verified) => AuthState::TokenValidated(verified),
                Err(e) => {
                    tracing::warn!("❌ Access token rejected: {}", e);
                    AuthState::Rejected(RejectReason::InvalidCredential)
                }
            },

            AuthState::TokenValidated(verified) => {
                let session = store.get(verified.user_id).await.map_err(|e| {
                    tracing::error!("❌ Session lookup failed: {}", e);
                    AppError::from(e)
                })?;

                match session {
                    Some(session)
                        if tokens_match(session.access_token.value(), verified.token.value())
                            && !session.access_token.is_expired_at(now) =>
                    {
                        AuthState::Authenticated(AuthIdentity {
                            user_id: session.user_id,
                            profile_id: session.profile_id,
                        })
                    }
                    _ => {
                        tracing::warn!("❌ Access token no longer current for user: {}", verified.user_id);
                        AuthState::Rejected(RejectReason::RevokedCredential)
                    }
                }
            }

            AuthState::Authenticated(identity) => {
                tracing::debug!("✅ User authenticated: {}", identity.user_id);
                return Ok(identity);
            }

            AuthState::Rejected(reason) => return Err(reason.into()),
        };
    }
}

/// A middleware that requires a valid access token.
///
/// On success the caller's `AuthIdentity` is attached to the request
/// extensions for the handlers downstream.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let header = request.headers().get(AUTHORIZATION).cloned();
    let identity = authenticate(
        state.auth.store(),
        state.auth.issuer(),
        header.as_ref(),
        Utc::now(),
    )
    .await?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::Session;
    use crate::repositories::session::MemorySessionStore;
    use chrono::Duration;

    const SECRET: &[u8] = b"middleware-test-secret-0123456789";

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    async fn seeded(now: DateTime<Utc>) -> (MemorySessionStore, TokenIssuer, Session) {
        let issuer = TokenIssuer::new(SECRET);
        let session = Session {
            user_id: 11,
            profile_id: 22,
            access_token: issuer.issue(11, 22, TokenKind::Access, 900, now).unwrap(),
            refresh_token: issuer.issue(11, 22, TokenKind::Refresh, 3600, now).unwrap(),
            is_validated: true,
        };
        let store = MemorySessionStore::new();
        store.put(11, &session).await.unwrap();
        (store, issuer, session)
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(Some(&bearer("abc"))), Some("abc".to_string()));
        assert_eq!(
            extract_bearer_token(Some(&HeaderValue::from_static("bearer  xyz "))),
            Some("xyz".to_string())
        );
        assert_eq!(extract_bearer_token(Some(&HeaderValue::from_static("Basic abc"))), None);
        assert_eq!(extract_bearer_token(Some(&HeaderValue::from_static("Bearer "))), None);
        assert_eq!(extract_bearer_token(None), None);
    }

    #[tokio::test]
    async fn test_current_token_is_authenticated() {
        let now = Utc::now();
        let (store, issuer, session) = seeded(now).await;

        let identity = authenticate(&store, &issuer, Some(&bearer(session.access_token.value())), now)
            .await
            .unwrap();

        assert_eq!(identity, AuthIdentity { user_id: 11, profile_id: 22 });
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let now = Utc::now();
        let (store, issuer, _) = seeded(now).await;

        let err = authenticate(&store, &issuer, None, now).await.unwrap_err();
        assert!(matches!(err, AppError::MissingCredential));
    }

    #[tokio::test]
    async fn test_expired_token_rejected_even_with_session() {
        let now = Utc::now();
        let (store, issuer, session) = seeded(now).await;
        let later = session.access_token.issued_at() + Duration::seconds(901);

        let err = authenticate(&store, &issuer, Some(&bearer(session.access_token.value())), later)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));
        assert_eq!(err.to_string(), "invalid credential");
    }

    #[tokio::test]
    async fn test_refresh_token_not_accepted_as_bearer() {
        let now = Utc::now();
        let (store, issuer, session) = seeded(now).await;

        let err = authenticate(&store, &issuer, Some(&bearer(session.refresh_token.value())), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_superseded_token_is_revoked() {
        let now = Utc::now();
        let (store, issuer, old) = seeded(now).await;

        let mut replaced = old.clone();
        replaced.access_token = issuer.issue(11, 22, TokenKind::Access, 900, now).unwrap();
        store.put(11, &replaced).await.unwrap();

        let err = authenticate(&store, &issuer, Some(&bearer(old.access_token.value())), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Revoked));
    }

    #[tokio::test]
    async fn test_deleted_session_is_revoked() {
        let now = Utc::now();
        let (store, issuer, session) = seeded(now).await;
        store.delete(11).await.unwrap();

        let err = authenticate(&store, &issuer, Some(&bearer(session.access_token.value())), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Revoked));
    }
}
