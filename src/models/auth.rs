use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{session::Session, token::Token};

/// The request payload for login and registration.
///
/// Only these two fields are accepted from the client.
#[derive(Deserialize, Clone)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("email", &mask_email(&self.email))
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Masks the local part of an email address for logging: `alice@x.com`
/// becomes `a***@x.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, domain)
        }
        None => "***".to_string(),
    }
}

/// The request payload for a token refresh.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// A token as exposed over REST.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RestToken {
    pub value: String,
    pub age: i64,
}

impl From<&Token> for RestToken {
    fn from(token: &Token) -> Self {
        Self {
            value: token.value().to_string(),
            age: token.age(),
        }
    }
}

/// The response payload for a successful login, registration or refresh.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub id: u64,
    pub access_token: RestToken,
    pub refresh_token: RestToken,
    pub profile_id: u64,
    pub is_validated: bool,
}

impl From<&Session> for LoginResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.user_id,
            access_token: RestToken::from(&session.access_token),
            refresh_token: RestToken::from(&session.refresh_token),
            profile_id: session.profile_id,
            is_validated: session.is_validated,
        }
    }
}

/// The account backend's result code for an auth-related call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Ok,
    NotFound,
    AlreadyExists,
    /// A code with no known meaning, kept verbatim for logging.
    Unhandled(i32),
}

impl AuthOutcome {
    pub const OK: i32 = 0;
    pub const NOT_FOUND: i32 = 1;
    pub const ALREADY_EXIST: i32 = 2;

    /// Decodes a wire code. Unknown codes never decode to `Ok`.
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::OK => AuthOutcome::Ok,
            Self::NOT_FOUND => AuthOutcome::NotFound,
            Self::ALREADY_EXIST => AuthOutcome::AlreadyExists,
            other => AuthOutcome::Unhandled(other),
        }
    }

    /// Encodes the outcome back into its wire code.
    pub fn code(self) -> i32 {
        match self {
            AuthOutcome::Ok => Self::OK,
            AuthOutcome::NotFound => Self::NOT_FOUND,
            AuthOutcome::AlreadyExists => Self::ALREADY_EXIST,
            AuthOutcome::Unhandled(code) => code,
        }
    }
}

/// A backend-issued token: opaque value plus lifetime in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub age: i64,
}

/// The payload returned by the backend's login and register calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReply {
    pub user_id: u64,
    pub profile_id: u64,
    pub access_token: IssuedToken,
    pub refresh_token: IssuedToken,
    pub is_validated: bool,
    pub outcome: AuthOutcome,
}

/// The payload returned by the backend's validate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStatus {
    pub user_id: u64,
    pub profile_id: u64,
    pub is_validated: bool,
    pub outcome: AuthOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "a***@example.com");
        assert_eq!(mask_email("@example.com"), "***@example.com");
        assert_eq!(mask_email("not-an-email"), "***");
    }

    #[test]
    fn test_auth_request_debug_hides_secrets() {
        let request = AuthRequest {
            email: "alice@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", request);
        assert!(!rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("a***@example.com"));
    }
}
