use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use zeroize::{Zeroize, Zeroizing};

use crate::models::token::MAX_TOKEN_AGE_SECS;

/// Which session store implementation to run with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionBackend {
    Redis,
    Memory,
}

impl FromStr for SessionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(SessionBackend::Redis),
            "memory" => Ok(SessionBackend::Memory),
            other => anyhow::bail!("unknown session store {:?} (expected redis or memory)", other),
        }
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The session store implementation.
    pub session_backend: SessionBackend,
    /// Base URL of the account backend's RPC endpoint.
    pub account_backend_url: String,
    /// Deadline for each account backend call, in milliseconds.
    pub backend_timeout_ms: u64,
    /// Extra attempts after a retryable account backend failure.
    pub backend_retries: u32,
    /// The shared secret tokens are signed with.
    pub token_secret: Zeroizing<Vec<u8>>,
    /// Access token lifetime when the backend supplies none.
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime when the backend supplies none.
    pub refresh_token_ttl_secs: i64,
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e))
}

/// Decodes and checks the hex-encoded token secret.
pub fn decode_token_secret(secret_hex: &str) -> Result<Zeroizing<Vec<u8>>> {
    let bytes = hex::decode(secret_hex.trim()).context("TOKEN_SECRET must be valid hexadecimal")?;
    let bytes = Zeroizing::new(bytes);

    if bytes.len() < 32 {
        anyhow::bail!("TOKEN_SECRET must be at least 32 bytes (64 hex characters)");
    }
    Ok(bytes)
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let mut secret_hex = env::var("TOKEN_SECRET")
            .context("TOKEN_SECRET must be set (generate with: openssl rand -hex 32)")?;
        let token_secret = decode_token_secret(&secret_hex);
        secret_hex.zeroize();
        let token_secret = token_secret?;

        let access_token_ttl_secs: i64 = env_or("ACCESS_TOKEN_TTL_SECS", "900")?;
        let refresh_token_ttl_secs: i64 = env_or("REFRESH_TOKEN_TTL_SECS", "604800")?;
        for ttl in [access_token_ttl_secs, refresh_token_ttl_secs] {
            if !(1..=MAX_TOKEN_AGE_SECS).contains(&ttl) {
                anyhow::bail!("Token lifetimes must be between 1 and {} seconds", MAX_TOKEN_AGE_SECS);
            }
        }

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:3000")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            session_backend: env_or("SESSION_STORE", "redis")?,
            account_backend_url: env::var("ACCOUNT_BACKEND_URL")
                .context("ACCOUNT_BACKEND_URL must be set")?,
            backend_timeout_ms: env_or("BACKEND_TIMEOUT_MS", "2000")?,
            backend_retries: env_or("BACKEND_RETRIES", "1")?,
            token_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
        })
    }
}
