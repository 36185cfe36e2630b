//! Distributed mutual exclusion over a shared key-value store.
//!
//! [`DistributedLock`] serializes critical sections across process boundaries
//! by creating a store entry with [`LockStore::set_if_absent`]. Ownership is
//! established purely by store-side atomicity: whichever caller creates the
//! entry holds the lock until it deletes the entry or the TTL expires. The
//! TTL self-heals a crashed holder at the cost of making this a best-effort
//! mutex: a holder whose critical section outlives the TTL loses the lock
//! silently, so callers must size [`LockConfig::ttl`] above their expected
//! work duration.
//!
//! Acquisition retries on an interval, bounded by
//! [`LockConfig::max_retry_time`], and can be interrupted through a
//! `watch::Receiver<bool>` cancellation signal so shutdown never hangs on a
//! contended key.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use uuid::Uuid;

/// Errors surfaced by lock acquisition and release.
#[derive(Error, Debug)]
pub enum LockError {
    /// The underlying store faulted. Never retried internally.
    #[error("lock store error: {0}")]
    Store(String),

    /// Acquisition exceeded the configured maximum retry time.
    #[error("lock acquisition timed out after {waited:?} for key {key}")]
    Timeout {
        /// Key that stayed contended.
        key: String,
        /// Wall-clock time spent waiting.
        waited: Duration,
    },

    /// The caller's cancellation signal fired during the wait.
    #[error("lock acquisition cancelled for key {key}")]
    Cancelled {
        /// Key the caller was waiting for.
        key: String,
    },
}

/// Timing configuration for [`DistributedLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Entry lifetime. Must exceed the expected critical-section duration;
    /// the lock is not renewed while held.
    pub ttl: Duration,
    /// Upper bound on the total time spent waiting for a contended key.
    pub max_retry_time: Duration,
    /// Pause between acquisition attempts.
    pub retry_interval: Duration,
}

impl LockConfig {
    /// Create the default configuration: 60s TTL, 180s maximum retry time,
    /// 500ms retry interval.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_retry_time: Duration::from_secs(180),
            retry_interval: Duration::from_millis(500),
        }
    }

    /// Set the entry lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the upper bound on the total wait for a contended key.
    #[must_use]
    pub const fn with_max_retry_time(mut self, max_retry_time: Duration) -> Self {
        self.max_retry_time = max_retry_time;
        self
    }

    /// Set the pause between acquisition attempts.
    #[must_use]
    pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability for atomic set-if-absent-with-expiry and delete against a
/// shared key-value store.
///
/// Implementations must guarantee that `set_if_absent` is atomic across
/// concurrent callers: for a given key, at most one caller observes `true`
/// while the entry exists.
pub trait LockStore: Send + Sync {
    /// Atomically create `key → value` with lifetime `ttl` if the key is
    /// absent.
    ///
    /// Returns `true` when the entry was created by this call and `false`
    /// when the key already existed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] when the store is unreachable or faulted.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool, LockError>> + Send;

    /// Delete `key` unconditionally. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] when the store is unreachable or faulted.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = Result<(), LockError>> + Send;
}

/// A named mutex backed by a shared [`LockStore`].
///
/// Cloning is cheap when the store is cheap to clone; clones share the same
/// holder marker. Independent instances (e.g. separate processes) carry
/// distinct markers, which only matters for diagnostics; release never
/// compares the marker.
#[derive(Debug, Clone)]
pub struct DistributedLock<S> {
    store: S,
    config: LockConfig,
    holder: String,
}

impl<S: LockStore> DistributedLock<S> {
    /// Create a lock over `store` with the given timing configuration.
    #[must_use]
    pub fn new(store: S, config: LockConfig) -> Self {
        Self {
            store,
            config,
            holder: Uuid::new_v4().to_string(),
        }
    }

    /// Timing configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire the lock for `key`, waiting up to
    /// [`LockConfig::max_retry_time`].
    ///
    /// The first attempt happens immediately; while the key is held
    /// elsewhere, further attempts run every [`LockConfig::retry_interval`].
    /// The wait ends early when `cancel` flips to `true`. A dropped
    /// cancellation sender is not a cancellation; the wait simply can no
    /// longer be interrupted.
    ///
    /// # Errors
    ///
    /// - [`LockError::Timeout`] when the key stayed contended past the
    ///   maximum retry time.
    /// - [`LockError::Cancelled`] when the cancellation signal fired (or was
    ///   already set on entry).
    /// - [`LockError::Store`] immediately on a store fault; faults are never
    ///   retried.
    pub async fn acquire(
        &self,
        key: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), LockError> {
        let started = Instant::now();

        loop {
            if *cancel.borrow() {
                return Err(LockError::Cancelled {
                    key: key.to_string(),
                });
            }

            if self
                .store
                .set_if_absent(key, &self.holder, self.config.ttl)
                .await?
            {
                tracing::debug!(key = key, waited = ?started.elapsed(), "lock acquired");
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= self.config.max_retry_time {
                tracing::warn!(key = key, waited = ?waited, "lock acquisition timed out");
                return Err(LockError::Timeout {
                    key: key.to_string(),
                    waited,
                });
            }

            tokio::select! {
                () = time::sleep(self.config.retry_interval) => {}
                changed = cancel.changed() => {
                    if changed.is_ok() && *cancel.borrow() {
                        return Err(LockError::Cancelled {
                            key: key.to_string(),
                        });
                    }
                    // Sender dropped or signal reset: this arm can no longer
                    // interrupt the wait, so sit out the full interval.
                    time::sleep(self.config.retry_interval).await;
                }
            }
        }
    }

    /// Release the lock for `key`.
    ///
    /// Deletes the store entry unconditionally; releasing a key that is not
    /// held (already released or expired) succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Store`] when the store delete fails.
    pub async fn release(&self, key: &str) -> Result<(), LockError> {
        self.store.delete(key).await?;
        tracing::debug!(key = key, "lock released");
        Ok(())
    }
}
