use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Longest lifetime any credential may carry: ten years.
pub const MAX_TOKEN_AGE_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// The role a token plays within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Presented on every authenticated request.
    Access,
    /// Used only to mint a new token pair.
    Refresh,
}

/// A signed credential with a validity window.
///
/// Tokens are immutable once created. A token whose `age` is not positive,
/// or whose `issued_at + age` has been reached, is expired and must never be
/// treated as valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The opaque credential string handed to the client.
    value: String,
    /// Seconds to live from `issued_at`.
    age: i64,
    /// The instant the token was minted.
    issued_at: DateTime<Utc>,
}

impl Token {
    /// Creates a new `Token`.
    pub fn new(value: String, age: i64, issued_at: DateTime<Utc>) -> Self {
        Self {
            value,
            age,
            issued_at,
        }
    }

    /// Returns the opaque credential string.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the token's lifetime in seconds.
    pub fn age(&self) -> i64 {
        self.age
    }

    /// Returns the instant the token was minted.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns the instant at which the token stops being valid, or `None`
    /// if that instant is not representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        TimeDelta::try_seconds(self.age).and_then(|age| self.issued_at.checked_add_signed(age))
    }

    /// Returns `true` if the token is no longer valid at `now`.
    ///
    /// An age beyond `MAX_TOKEN_AGE_SECS` never validates.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.age <= 0 || self.age > MAX_TOKEN_AGE_SECS {
            return true;
        }
        match self.expires_at() {
            Some(expires_at) => now >= expires_at,
            None => true,
        }
    }

    /// Seconds of validity left at `now`, or zero once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        if self.is_expired_at(now) {
            return 0;
        }
        self.expires_at()
            .map(|expires_at| (expires_at - now).num_seconds())
            .unwrap_or(0)
    }
}
