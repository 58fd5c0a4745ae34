use serde::{Deserialize, Serialize};

use crate::models::token::Token;

/// The server-side record binding a user to their current token pair.
///
/// Only one session per user is retained; a new login or refresh replaces
/// the previous record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The ID of the user this session belongs to.
    pub user_id: u64,
    /// The user's profile ID as reported by the account backend.
    pub profile_id: u64,
    /// The short-lived token presented on each request.
    pub access_token: Token,
    /// The long-lived token used to mint a new pair.
    pub refresh_token: Token,
    /// Whether the account backend reports the user as validated.
    pub is_validated: bool,
}

/// The identity bound to a request once the auth middleware accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: u64,
    pub profile_id: u64,
}
