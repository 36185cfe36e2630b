//! `PostgreSQL` [`UnitOfWork`] over a real database transaction.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use catalink_core::unit_of_work::{TransactionError, UnitOfWork};

use crate::biller_repository::PgBillerRepository;
use crate::link_repository::PgLinkRepository;
use crate::session::{PgSession, TxCell};

/// `PostgreSQL`-backed [`UnitOfWork`].
///
/// The root handle is built from a pool; `execute` opens one transaction
/// and hands the closure a scoped clone whose repositories route every
/// query through it. A scoped handle's own `execute` detects the open
/// transaction and runs the closure directly, so nested calls share the
/// transaction and only the outermost one commits or rolls back.
#[derive(Clone)]
pub struct PgUnitOfWork {
    session: PgSession,
}

impl PgUnitOfWork {
    /// Create a unit of work over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            session: PgSession::over_pool(pool),
        }
    }

    async fn take_transaction(cell: &TxCell) -> Option<Transaction<'static, Postgres>> {
        cell.lock().await.take()
    }
}

impl UnitOfWork for PgUnitOfWork {
    type Links = PgLinkRepository;
    type Billers = PgBillerRepository;

    fn links(&self) -> Self::Links {
        PgLinkRepository::with_session(self.session.clone())
    }

    fn billers(&self) -> Self::Billers {
        PgBillerRepository::with_session(self.session.clone())
    }

    async fn execute<T, F, Fut>(&self, f: F) -> Result<T, TransactionError>
    where
        T: Send,
        F: FnOnce(Self) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, TransactionError>> + Send,
    {
        if self.session.in_transaction() {
            return f(self.clone()).await;
        }

        let tx = self
            .session
            .pool()
            .begin()
            .await
            .map_err(|e| TransactionError::Begin(e.to_string()))?;
        let cell: TxCell = Arc::new(Mutex::new(Some(tx)));
        let scoped = Self {
            session: self.session.with_transaction(Arc::clone(&cell)),
        };

        match AssertUnwindSafe(f(scoped)).catch_unwind().await {
            Ok(Ok(value)) => match Self::take_transaction(&cell).await {
                Some(tx) => tx
                    .commit()
                    .await
                    .map(|()| value)
                    .map_err(|e| TransactionError::Commit(e.to_string())),
                None => Err(TransactionError::Commit(
                    "transaction already closed".to_string(),
                )),
            },
            Ok(Err(cause)) => match Self::take_transaction(&cell).await {
                Some(tx) => match tx.rollback().await {
                    Ok(()) => Err(cause),
                    Err(e) => Err(TransactionError::RollbackFailed {
                        cause: Box::new(cause),
                        rollback: e.to_string(),
                    }),
                },
                None => Err(cause),
            },
            Err(panic) => {
                if let Some(tx) = Self::take_transaction(&cell).await {
                    if let Err(error) = tx.rollback().await {
                        tracing::error!(error = %error, "Rollback after panic failed");
                    }
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
