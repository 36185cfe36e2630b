//! In-memory [`UnitOfWork`] with snapshot-based rollback.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use futures::FutureExt;

use super::repository::{InMemoryBillerRepository, InMemoryLinkRepository, MemoryState};
use crate::unit_of_work::{TransactionError, UnitOfWork};

/// In-memory unit of work double.
///
/// `execute` snapshots the shared state before running the closure and
/// restores the snapshot on error or panic, so rollback genuinely undoes
/// every repository write the closure made. Clones share state; the scoped
/// copy handed to the closure is flagged so nested `execute` calls join the
/// run already in flight.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUnitOfWork {
    state: Arc<Mutex<MemoryState>>,
    in_tx: bool,
}

impl InMemoryUnitOfWork {
    /// Create a unit of work over fresh empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Result<MemoryState, TransactionError> {
        self.state
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| TransactionError::Begin("mutex lock failed".to_string()))
    }

    fn restore(&self, snapshot: MemoryState) -> Result<(), String> {
        match self.state.lock() {
            Ok(mut guard) => {
                *guard = snapshot;
                Ok(())
            }
            Err(_) => Err("mutex lock failed".to_string()),
        }
    }
}

impl UnitOfWork for InMemoryUnitOfWork {
    type Links = InMemoryLinkRepository;
    type Billers = InMemoryBillerRepository;

    fn links(&self) -> Self::Links {
        InMemoryLinkRepository::with_state(Arc::clone(&self.state))
    }

    fn billers(&self) -> Self::Billers {
        InMemoryBillerRepository::with_state(Arc::clone(&self.state))
    }

    async fn execute<T, F, Fut>(&self, f: F) -> Result<T, TransactionError>
    where
        T: Send,
        F: FnOnce(Self) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, TransactionError>> + Send,
    {
        if self.in_tx {
            return f(self.clone()).await;
        }

        let snapshot = self.snapshot()?;
        let scoped = Self {
            state: Arc::clone(&self.state),
            in_tx: true,
        };

        match AssertUnwindSafe(f(scoped)).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(cause)) => match self.restore(snapshot) {
                Ok(()) => Err(cause),
                Err(rollback) => Err(TransactionError::RollbackFailed {
                    cause: Box::new(cause),
                    rollback,
                }),
            },
            Err(panic) => {
                if let Err(error) = self.restore(snapshot) {
                    tracing::error!(error = %error, "rollback after panic failed");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
