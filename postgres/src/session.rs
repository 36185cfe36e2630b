//! Shared query routing for pool-backed and transaction-backed repositories.

use std::sync::Arc;

use sqlx::postgres::{PgArguments, PgQueryResult, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;

use catalink_core::repository::RepositoryError;

/// Slot holding the transaction a scoped session runs inside. The unit of
/// work takes the transaction out to commit or roll back; repository calls
/// arriving after that find the slot empty and fail instead of silently
/// running outside the transaction.
pub(crate) type TxCell = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

/// A connection context: either the bare pool or an open transaction.
///
/// Repositories hold a session and never care which backing they got; the
/// unit of work hands out transaction-backed clones for the duration of a
/// closure.
#[derive(Clone)]
pub(crate) struct PgSession {
    pool: PgPool,
    tx: Option<TxCell>,
}

impl PgSession {
    pub(crate) const fn over_pool(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    pub(crate) fn with_transaction(&self, cell: TxCell) -> Self {
        Self {
            pool: self.pool.clone(),
            tx: Some(cell),
        }
    }

    pub(crate) const fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub(crate) const fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn execute(
        &self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<PgQueryResult, sqlx::Error> {
        if let Some(cell) = &self.tx {
            let mut guard = cell.lock().await;
            let tx = guard.as_mut().ok_or_else(closed_transaction)?;
            query.execute(&mut **tx).await
        } else {
            query.execute(&self.pool).await
        }
    }

    pub(crate) async fn fetch_all(
        &self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<Vec<PgRow>, sqlx::Error> {
        if let Some(cell) = &self.tx {
            let mut guard = cell.lock().await;
            let tx = guard.as_mut().ok_or_else(closed_transaction)?;
            query.fetch_all(&mut **tx).await
        } else {
            query.fetch_all(&self.pool).await
        }
    }

    pub(crate) async fn fetch_optional(
        &self,
        query: Query<'_, Postgres, PgArguments>,
    ) -> Result<Option<PgRow>, sqlx::Error> {
        if let Some(cell) = &self.tx {
            let mut guard = cell.lock().await;
            let tx = guard.as_mut().ok_or_else(closed_transaction)?;
            query.fetch_optional(&mut **tx).await
        } else {
            query.fetch_optional(&self.pool).await
        }
    }
}

fn closed_transaction() -> sqlx::Error {
    sqlx::Error::Protocol("transaction already closed".to_string())
}

/// Map a sqlx error onto the repository error surface.
pub(crate) fn map_db_error(error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            RepositoryError::Duplicate(db.message().to_string())
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        _ => RepositoryError::Database(error.to_string()),
    }
}
