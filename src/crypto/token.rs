use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::models::token::{MAX_TOKEN_AGE_SECS, Token, TokenKind};

/// Errors raised while signing or checking a credential.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("malformed or badly signed token: {0}")]
    Malformed(String),

    #[error("token kind mismatch: expected {expected:?}, found {found:?}")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("token expired")]
    Expired,

    #[error("token age out of range: {0}")]
    AgeOutOfRange(i64),
}

/// The signed payload of a credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// User ID, as a decimal string.
    pub sub: String,
    /// Profile ID.
    pub pid: u64,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    /// Random per-token identifier, so two tokens minted in the same second differ.
    pub jti: String,
}

impl TokenClaims {
    /// Parses the subject back into a user ID.
    pub fn user_id(&self) -> Result<u64, TokenError> {
        self.sub
            .parse()
            .map_err(|_| TokenError::Malformed(format!("non-numeric subject {:?}", self.sub)))
    }

    pub fn age(&self) -> i64 {
        self.exp.saturating_sub(self.iat)
    }
}

/// Compares two credential strings in constant time.
pub fn tokens_match(stored: &str, presented: &str) -> bool {
    stored.len() == presented.len() && bool::from(stored.as_bytes().ct_eq(presented.as_bytes()))
}

/// A credential that passed signature, kind and expiry checks.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: u64,
    pub profile_id: u64,
    pub token: Token,
}

/// Mints and verifies HS256-signed session credentials.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Creates a new `TokenIssuer` from a shared secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against a caller-supplied clock in `verify`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mints a token of `kind` for the given user, valid for `age` seconds from `now`.
    pub fn issue(
        &self,
        user_id: u64,
        profile_id: u64,
        kind: TokenKind,
        age: i64,
        now: DateTime<Utc>,
    ) -> Result<Token, TokenError> {
        let iat = now.timestamp();
        let exp = iat
            .checked_add(age)
            .filter(|_| age <= MAX_TOKEN_AGE_SECS)
            .ok_or(TokenError::AgeOutOfRange(age))?;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            pid: profile_id,
            kind,
            iat,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        let issued_at = DateTime::from_timestamp(iat, 0).unwrap_or(now);
        Ok(Token::new(value, age, issued_at))
    }

    /// Checks signature, structure, kind and expiry of a presented credential.
    pub fn verify(
        &self,
        value: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<VerifiedToken, TokenError> {
        let data = decode::<TokenClaims>(value, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let claims = data.claims;

        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }

        let user_id = claims.user_id()?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| TokenError::Malformed(format!("iat out of range: {}", claims.iat)))?;
        let token = Token::new(value.to_string(), claims.age(), issued_at);

        if token.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            user_id,
            profile_id: claims.pid,
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let issuer = TokenIssuer::new(SECRET);
        let token = issuer.issue(42, 7, TokenKind::Access, 900, now()).unwrap();
        assert_eq!(token.age(), 900);
        assert_eq!(token.issued_at(), now());

        let verified = issuer
            .verify(token.value(), TokenKind::Access, now() + Duration::seconds(10))
            .unwrap();
        assert_eq!(verified.user_id, 42);
        assert_eq!(verified.profile_id, 7);
        assert_eq!(verified.token, token);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new(SECRET);
        let token = issuer.issue(1, 1, TokenKind::Access, 900, now()).unwrap();
        let err = issuer
            .verify(token.value(), TokenKind::Access, now() + Duration::seconds(901))
            .unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn test_zero_age_token_rejected() {
        let issuer = TokenIssuer::new(SECRET);
        let token = issuer.issue(1, 1, TokenKind::Access, 0, now()).unwrap();
        assert_eq!(
            issuer.verify(token.value(), TokenKind::Access, now()).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let issuer = TokenIssuer::new(SECRET);
        let token = issuer.issue(1, 1, TokenKind::Refresh, 900, now()).unwrap();
        assert!(matches!(
            issuer.verify(token.value(), TokenKind::Access, now()),
            Err(TokenError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let issuer = TokenIssuer::new(SECRET);
        let other = TokenIssuer::new(b"ffffffffffffffffffffffffffffffff");
        let token = other.issue(1, 1, TokenKind::Access, 900, now()).unwrap();
        assert!(matches!(
            issuer.verify(token.value(), TokenKind::Access, now()),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            issuer.verify("not-a-token", TokenKind::Access, now()),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_out_of_range_age_refused() {
        let issuer = TokenIssuer::new(SECRET);
        assert_eq!(
            issuer.issue(1, 1, TokenKind::Refresh, i64::MAX, now()).unwrap_err(),
            TokenError::AgeOutOfRange(i64::MAX)
        );
        assert!(matches!(
            issuer.issue(1, 1, TokenKind::Refresh, MAX_TOKEN_AGE_SECS + 1, now()),
            Err(TokenError::AgeOutOfRange(_))
        ));
        assert!(issuer.issue(1, 1, TokenKind::Refresh, MAX_TOKEN_AGE_SECS, now()).is_ok());
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc.def", "abc.def"));
        assert!(!tokens_match("abc.def", "abc.deg"));
        assert!(!tokens_match("abc", "abc.def"));
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let issuer = TokenIssuer::new(SECRET);
        let a = issuer.issue(1, 1, TokenKind::Access, 900, now()).unwrap();
        let b = issuer.issue(1, 1, TokenKind::Access, 900, now()).unwrap();
        assert_ne!(a.value(), b.value());
    }
}
