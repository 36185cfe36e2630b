//! In-memory [`LockStore`] with TTL expiry and fault injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use crate::lock::{LockError, LockStore};

/// In-memory lock store double.
///
/// Entries expire against the tokio clock, so paused-clock tests can
/// exercise TTL behavior with [`tokio::time::advance`]. Clones share the
/// same entries, which is how a test simulates several processes contending
/// on one store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    fail_sets: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl InMemoryLockStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set_if_absent` fail with a store error.
    pub fn set_fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail with a store error.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Plant an entry directly, bypassing the set-if-absent gate.
    ///
    /// # Panics
    ///
    /// Panics when the internal mutex is poisoned. Test-only helper.
    #[allow(clippy::unwrap_used)]
    pub fn force_set(&self, key: &str, value: &str, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Whether a live (unexpired) entry exists for `key`.
    ///
    /// # Panics
    ///
    /// Panics when the internal mutex is poisoned. Test-only helper.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.holder_of(key).is_some()
    }

    /// Value of the live entry for `key`, if any.
    ///
    /// # Panics
    ///
    /// Panics when the internal mutex is poisoned. Test-only helper.
    #[allow(clippy::unwrap_used)]
    #[must_use]
    pub fn holder_of(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }
}

impl LockStore for InMemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(LockError::Store("simulated store failure".to_string()));
        }

        let now = Instant::now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| LockError::Store("mutex lock failed".to_string()))?;

        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
            entries.remove(key);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        tracing::debug!(key = key, "mock lock entry created");
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), LockError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(LockError::Store("simulated store failure".to_string()));
        }

        let mut entries = self
            .entries
            .lock()
            .map_err(|_| LockError::Store("mutex lock failed".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_set_if_absent_admits_exactly_one() {
        let store = InMemoryLockStore::new();

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_if_absent("link:1:2", &format!("holder-{i}"), Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        let holder = store.holder_of("link:1:2").unwrap();
        assert!(holder.starts_with("holder-"));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_against_the_tokio_clock() {
        let store = InMemoryLockStore::new();

        assert!(store
            .set_if_absent("link:1:2", "a", Duration::from_secs(5))
            .await
            .unwrap());
        assert!(!store
            .set_if_absent("link:1:2", "b", Duration::from_secs(5))
            .await
            .unwrap());

        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(!store.contains("link:1:2"));
        assert!(store
            .set_if_absent("link:1:2", "c", Duration::from_secs(5))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn delete_removes_and_tolerates_absence() {
        let store = InMemoryLockStore::new();
        store.force_set("link:1:2", "a", Duration::from_secs(60));

        store.delete("link:1:2").await.unwrap();
        assert!(!store.contains("link:1:2"));
        store.delete("link:1:2").await.unwrap();
    }

    #[tokio::test]
    async fn injected_faults_fail_both_operations() {
        let store = InMemoryLockStore::new();
        store.set_fail_sets(true);
        store.set_fail_deletes(true);

        let set = store
            .set_if_absent("link:1:2", "a", Duration::from_secs(5))
            .await;
        assert!(matches!(set, Err(LockError::Store(_))));
        assert!(matches!(
            store.delete("link:1:2").await,
            Err(LockError::Store(_))
        ));

        store.set_fail_sets(false);
        store.set_fail_deletes(false);
        assert!(store
            .set_if_absent("link:1:2", "a", Duration::from_secs(5))
            .await
            .unwrap());
    }
}
