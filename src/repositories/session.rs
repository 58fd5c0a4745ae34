use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, aio::ConnectionManager};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::session::Session;

/// Infrastructure failures of the session store.
///
/// These never mean "not authenticated": a missing session is `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session record corrupt: {0}")]
    Corrupt(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Key-value repository mapping a user to their current session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Overwrites any existing session for `user_id`.
    ///
    /// The record expires with the session's refresh token.
    async fn put(&self, user_id: u64, session: &Session) -> Result<(), StoreError>;

    /// Returns the current session, or `None` if there is none.
    async fn get(&self, user_id: u64) -> Result<Option<Session>, StoreError>;

    /// Removes the session. Removing a missing session is not an error.
    async fn delete(&self, user_id: u64) -> Result<(), StoreError>;
}

/// Store-level TTL for a session: the refresh token's remaining lifetime,
/// never less than one second.
pub fn session_ttl_secs(session: &Session, now: DateTime<Utc>) -> u64 {
    session.refresh_token.remaining_secs(now).max(1) as u64
}

fn session_key(user_id: u64) -> String {
    format!("session:{}", user_id)
}

/// Redis-backed session store.
///
/// Each put is a single `SET key value EX ttl`, so a record is either
/// written whole or not at all.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    /// Creates a new `RedisSessionStore` over a pooled connection manager.
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Connects to `redis_url` and wraps the connection in a store.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;
        Ok(Self::new(redis))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, user_id: u64, session: &Session) -> Result<(), StoreError> {
        let session_json = sonic_rs::to_string(session)
            .map_err(|e| StoreError::Corrupt(format!("Session serialization failed: {}", e)))?;
        let ttl = session_ttl_secs(session, Utc::now());

        let mut conn = self.redis.clone();
        let _: () = conn
            .set_ex(session_key(user_id), &session_json, ttl)
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis set_ex failed: {}", e);
                StoreError::from(e)
            })?;

        tracing::debug!("Session saved to Redis: {} (ttl {}s)", session_key(user_id), ttl);
        Ok(())
    }

    async fn get(&self, user_id: u64) -> Result<Option<Session>, StoreError> {
        let mut conn = self.redis.clone();
        let session_json: Option<String> = conn.get(session_key(user_id)).await.map_err(|e| {
            tracing::error!("❌ Redis get failed: {}", e);
            StoreError::from(e)
        })?;

        session_json
            .map(|json| {
                sonic_rs::from_str::<Session>(&json)
                    .map_err(|e| StoreError::Corrupt(format!("Invalid session JSON: {}", e)))
            })
            .transpose()
    }

    async fn delete(&self, user_id: u64) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let _: () = conn.del(session_key(user_id)).await.map_err(|e| {
            tracing::error!("❌ Redis del failed: {}", e);
            StoreError::from(e)
        })?;
        Ok(())
    }
}

/// In-process session store with per-entry expiry.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<u64, (Session, DateTime<Utc>)>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a session as of `now`, evicting it if its TTL has passed.
    pub async fn get_at(&self, user_id: u64, now: DateTime<Utc>) -> Option<Session> {
        let mut entries = self.entries.write().await;
        let expired = matches!(entries.get(&user_id), Some((_, evict_at)) if now >= *evict_at);
        if expired {
            entries.remove(&user_id);
            return None;
        }
        entries.get(&user_id).map(|(session, _)| session.clone())
    }

    /// Stores a session as of `now`, first dropping every entry whose TTL
    /// has passed.
    pub async fn put_at(&self, user_id: u64, session: &Session, now: DateTime<Utc>) {
        let evict_at = now + chrono::Duration::seconds(session_ttl_secs(session, now) as i64);
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expiry)| *expiry > now);
        entries.insert(user_id, (session.clone(), evict_at));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, user_id: u64, session: &Session) -> Result<(), StoreError> {
        self.put_at(user_id, session, Utc::now()).await;
        Ok(())
    }

    async fn get(&self, user_id: u64) -> Result<Option<Session>, StoreError> {
        Ok(self.get_at(user_id, Utc::now()).await)
    }

    async fn delete(&self, user_id: u64) -> Result<(), StoreError> {
        self.entries.write().await.remove(&user_id);
        Ok(())
    }
}
