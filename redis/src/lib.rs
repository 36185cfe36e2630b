//! # Catalink Redis
//!
//! Redis-backed [`LockStore`] for the catalink distributed lock.
//!
//! ## Key Features
//!
//! - **Atomic acquisition**: `SET NX PX` creates the entry and its expiry in
//!   one server-side step, so at most one contender ever sees success
//! - **Self-healing**: the millisecond TTL reaps entries left behind by a
//!   crashed holder
//! - **Connection pooling**: uses `ConnectionManager` for connection reuse
//!   and automatic reconnection
//! - **Namespacing**: every entry lives under the `lock:` prefix
//!
//! ## Thread Safety
//!
//! Each clone shares the same `ConnectionManager` (connection pool).

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use catalink_core::lock::{LockError, LockStore};

/// Redis-backed lock store.
pub struct RedisLockStore {
    conn_manager: ConnectionManager,
}

impl RedisLockStore {
    /// Connect to Redis at `redis_url` (e.g. `redis://localhost:6379`).
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] when the URL is invalid or the initial
    /// connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, LockError> {
        let client = Client::open(redis_url)
            .map_err(|e| LockError::Store(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError::Store(format!("Failed to connect to Redis: {e}")))?;

        Ok(Self { conn_manager })
    }

    /// Build a store over an existing connection manager.
    #[must_use]
    pub const fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    /// Generate the namespaced Redis key for a lock entry.
    fn lock_key(key: &str) -> String {
        format!("lock:{key}")
    }
}

impl Clone for RedisLockStore {
    fn clone(&self) -> Self {
        Self {
            conn_manager: self.conn_manager.clone(),
        }
    }
}

impl LockStore for RedisLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut conn = self.conn_manager.clone();
        let lock_key = Self::lock_key(key);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        // SET key value NX PX ttl: the entry and its expiry land atomically,
        // and an existing key leaves a Nil reply instead of "OK".
        let reply: Option<String> = redis::cmd("SET")
            .arg(&lock_key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Store(format!("Failed to set lock key: {e}")))?;

        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), LockError> {
        let mut conn = self.conn_manager.clone();
        let lock_key = Self::lock_key(key);

        let deleted: i32 = conn
            .del(&lock_key)
            .await
            .map_err(|e| LockError::Store(format!("Failed to delete lock key: {e}")))?;

        tracing::debug!(key = %lock_key, deleted = deleted, "Deleted lock entry");
        Ok(())
    }
}
