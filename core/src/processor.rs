//! Transition-driven link deactivation.
//!
//! [`TransitionProcessor`] consumes transition events and deactivates the
//! product-biller link a failed transition refers to. Every step is guarded
//! so redelivery is harmless: successful transitions short-circuit before
//! any I/O, the per-subject [`DistributedLock`] serializes concurrent
//! deliveries for the same link, and a link that is already inactive is
//! left untouched. The outcome reports which of those paths ran.

use thiserror::Error;
use tokio::sync::watch;

use crate::event::TransitionEvent;
use crate::link::ProductBillerChanges;
use crate::lock::{DistributedLock, LockError, LockStore};
use crate::repository::{ProductBillerRepository, RepositoryError};

/// Audit actor stamped on rows the processor mutates.
pub const TRANSITION_ACTOR: &str = "worker";

/// Errors surfaced by transition processing.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The payload was not a valid transition event.
    #[error("malformed transition payload: {0}")]
    Payload(String),

    /// Lock acquisition failed; nothing was read or written.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// A repository call failed. [`RepositoryError::NotFound`] means the
    /// event referenced a pair with no live link.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// How a transition event was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The link was deactivated by this delivery.
    Applied,
    /// The link was already inactive; redelivery changed nothing.
    AlreadyInactive,
    /// The transition reported success, so the link stays as it is.
    Settled,
}

/// Idempotent handler for transition events.
#[derive(Debug, Clone)]
pub struct TransitionProcessor<S, R> {
    lock: DistributedLock<S>,
    links: R,
}

impl<S: LockStore, R: ProductBillerRepository> TransitionProcessor<S, R> {
    /// Create a processor from a configured lock and a link store.
    #[must_use]
    pub const fn new(lock: DistributedLock<S>, links: R) -> Self {
        Self { lock, links }
    }

    /// Decode `payload` as a transition event and process it.
    ///
    /// # Errors
    ///
    /// [`ProcessError::Payload`] when the bytes do not decode, otherwise as
    /// [`process`](Self::process).
    pub async fn handle(
        &self,
        payload: &[u8],
        cancel: watch::Receiver<bool>,
    ) -> Result<TransitionOutcome, ProcessError> {
        let event: TransitionEvent =
            serde_json::from_slice(payload).map_err(|e| ProcessError::Payload(e.to_string()))?;
        self.process(&event, cancel).await
    }

    /// Process one transition event.
    ///
    /// Successful transitions resolve to [`TransitionOutcome::Settled`]
    /// without taking the lock. Failed transitions deactivate the link for
    /// the event's `(product_id, biller_id)` pair under the per-subject
    /// lock; the lock is released whether or not the deactivation went
    /// through, and a release failure is logged without overriding the
    /// deactivation's result.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Lock`] when the per-subject lock could not be
    ///   acquired (contended past the retry budget, cancelled, or the
    ///   store faulted). The link is untouched.
    /// - [`ProcessError::Repository`] when the link could not be read or
    ///   written; [`RepositoryError::NotFound`] when the pair has no live
    ///   link.
    pub async fn process(
        &self,
        event: &TransitionEvent,
        cancel: watch::Receiver<bool>,
    ) -> Result<TransitionOutcome, ProcessError> {
        if event.status.is_success() {
            tracing::debug!(
                transition_id = event.id,
                "transition succeeded, leaving the link alone"
            );
            return Ok(TransitionOutcome::Settled);
        }

        let key = event.lock_key();
        self.lock.acquire(&key, cancel).await?;

        let outcome = self.deactivate(event).await;

        if let Err(error) = self.lock.release(&key).await {
            tracing::warn!(key = %key, error = %error, "failed to release transition lock");
        }
        outcome
    }

    async fn deactivate(&self, event: &TransitionEvent) -> Result<TransitionOutcome, ProcessError> {
        let link = self
            .links
            .fetch_by_subject(event.product_id, event.biller_id)
            .await?;

        if !link.is_active {
            tracing::debug!(link_id = link.id, "link already inactive");
            return Ok(TransitionOutcome::AlreadyInactive);
        }

        self.links
            .update(link.id, &ProductBillerChanges::deactivate(), TRANSITION_ACTOR)
            .await?;
        tracing::info!(
            transition_id = event.id,
            link_id = link.id,
            product_id = event.product_id,
            biller_id = event.biller_id,
            "link deactivated after failed transition"
        );
        Ok(TransitionOutcome::Applied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::event::TransitionStatus;
    use crate::link::NewProductBiller;
    use crate::lock::LockConfig;
    use crate::mocks::{InMemoryLinkRepository, InMemoryLockStore};

    fn no_cancel() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    fn failure_event(product_id: i64, biller_id: i64) -> TransitionEvent {
        TransitionEvent {
            id: 42,
            partner_id: 7,
            product_id,
            biller_id,
            status: TransitionStatus::Failure,
        }
    }

    fn processor_over(
        store: &InMemoryLockStore,
        links: &InMemoryLinkRepository,
        config: LockConfig,
    ) -> TransitionProcessor<InMemoryLockStore, InMemoryLinkRepository> {
        TransitionProcessor::new(DistributedLock::new(store.clone(), config), links.clone())
    }

    fn short_retry() -> LockConfig {
        LockConfig::new().with_max_retry_time(Duration::from_secs(3))
    }

    async fn seed_active_link(links: &InMemoryLinkRepository, product_id: i64, biller_id: i64) {
        links
            .create(&NewProductBiller::new(product_id, biller_id, "seed"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_transition_deactivates_the_link() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        seed_active_link(&links, 1, 2).await;
        let processor = processor_over(&store, &links, short_retry());

        let outcome = processor
            .process(&failure_event(1, 2), no_cancel())
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied);
        let link = links.fetch_by_subject(1, 2).await.unwrap();
        assert!(!link.is_active);
        assert_eq!(link.updated_by, TRANSITION_ACTOR);
        assert!(
            !store.contains(&failure_event(1, 2).lock_key()),
            "the lock must be released after processing"
        );
    }

    #[tokio::test]
    async fn successful_transition_touches_nothing() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        seed_active_link(&links, 1, 2).await;
        // A faulted store proves the short-circuit happens before the lock.
        store.set_fail_sets(true);
        let processor = processor_over(&store, &links, short_retry());

        let mut event = failure_event(1, 2);
        event.status = TransitionStatus::Success;
        let outcome = processor.process(&event, no_cancel()).await.unwrap();

        assert_eq!(outcome, TransitionOutcome::Settled);
        assert!(links.fetch_by_subject(1, 2).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn redelivery_is_idempotent() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        seed_active_link(&links, 1, 2).await;
        let processor = processor_over(&store, &links, short_retry());

        let first = processor
            .process(&failure_event(1, 2), no_cancel())
            .await
            .unwrap();
        let second = processor
            .process(&failure_event(1, 2), no_cancel())
            .await
            .unwrap();

        assert_eq!(first, TransitionOutcome::Applied);
        assert_eq!(second, TransitionOutcome::AlreadyInactive);
        assert!(!links.fetch_by_subject(1, 2).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn unknown_pair_surfaces_not_found() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        let processor = processor_over(&store, &links, short_retry());

        let result = processor.process(&failure_event(9, 9), no_cancel()).await;

        assert!(matches!(
            result,
            Err(ProcessError::Repository(RepositoryError::NotFound))
        ));
        assert!(
            !store.contains(&failure_event(9, 9).lock_key()),
            "the lock must be released on the error path too"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn contended_lock_aborts_without_mutation() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        seed_active_link(&links, 1, 2).await;
        store.force_set(
            &failure_event(1, 2).lock_key(),
            "other-worker",
            Duration::from_secs(3600),
        );
        let processor = processor_over(&store, &links, short_retry());

        let result = processor.process(&failure_event(1, 2), no_cancel()).await;

        assert!(matches!(
            result,
            Err(ProcessError::Lock(LockError::Timeout { .. }))
        ));
        assert!(
            links.fetch_by_subject(1, 2).await.unwrap().is_active,
            "a delivery that never held the lock must not mutate the link"
        );
    }

    #[tokio::test]
    async fn cancellation_aborts_before_any_write() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        seed_active_link(&links, 1, 2).await;
        let processor = processor_over(&store, &links, short_retry());

        let (tx, rx) = watch::channel(true);
        drop(tx);
        let result = processor.process(&failure_event(1, 2), rx).await;

        assert!(matches!(
            result,
            Err(ProcessError::Lock(LockError::Cancelled { .. }))
        ));
        assert!(links.fetch_by_subject(1, 2).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn release_failure_does_not_override_the_outcome() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        seed_active_link(&links, 1, 2).await;
        store.set_fail_deletes(true);
        let processor = processor_over(&store, &links, short_retry());

        let outcome = processor
            .process(&failure_event(1, 2), no_cancel())
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied);
        assert!(!links.fetch_by_subject(1, 2).await.unwrap().is_active);
        assert!(
            store.contains(&failure_event(1, 2).lock_key()),
            "the entry stays behind until its TTL expires"
        );
    }

    #[tokio::test]
    async fn handle_decodes_the_wire_payload() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        seed_active_link(&links, 1, 2).await;
        let processor = processor_over(&store, &links, short_retry());

        let payload =
            br#"{"id":42,"partner_id":7,"product_id":1,"biller_id":2,"status":"failure"}"#;
        let outcome = processor.handle(payload, no_cancel()).await.unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied);
    }

    #[tokio::test]
    async fn handle_rejects_garbage_and_unknown_statuses() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        let processor = processor_over(&store, &links, short_retry());

        let garbage = processor.handle(b"not json", no_cancel()).await;
        assert!(matches!(garbage, Err(ProcessError::Payload(_))));

        let unknown = processor
            .handle(
                br#"{"id":1,"partner_id":1,"product_id":1,"biller_id":1,"status":"refunded"}"#,
                no_cancel(),
            )
            .await;
        assert!(matches!(unknown, Err(ProcessError::Payload(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_redeliveries_deactivate_exactly_once() {
        let store = InMemoryLockStore::new();
        let links = InMemoryLinkRepository::new();
        seed_active_link(&links, 1, 2).await;

        // Plenty of retry budget so every contender eventually gets a turn.
        let config = LockConfig::new().with_max_retry_time(Duration::from_secs(30));
        let deliveries = (0..8).map(|_| {
            let processor = processor_over(&store, &links, config);
            async move { processor.process(&failure_event(1, 2), no_cancel()).await }
        });

        let results = futures::future::join_all(deliveries).await;

        let mut applied = 0;
        let mut already_inactive = 0;
        for result in results {
            match result.unwrap() {
                TransitionOutcome::Applied => applied += 1,
                TransitionOutcome::AlreadyInactive => already_inactive += 1,
                TransitionOutcome::Settled => panic!("no delivery reported success"),
            }
        }
        assert_eq!(applied, 1, "exactly one delivery may apply the transition");
        assert_eq!(already_inactive, 7);
        assert!(!links.fetch_by_subject(1, 2).await.unwrap().is_active);
    }
}
