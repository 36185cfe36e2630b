//! Closure-scoped transactional execution.
//!
//! [`UnitOfWork`] runs a closure against repository handles that all share
//! one transaction: commit happens only when the closure returns `Ok`,
//! rollback on `Err` or panic. The closure receives a *scoped* unit of work
//! rather than raw repositories, so helpers written against the trait
//! compose: a helper that calls [`UnitOfWork::execute`] on the scoped
//! handle joins the transaction already in flight instead of opening a
//! second one.

use thiserror::Error;

use crate::repository::{BillerRepository, ProductBillerRepository, RepositoryError};

/// Errors surfaced by transactional execution.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Opening the transaction failed; the closure never ran.
    #[error("failed to begin transaction: {0}")]
    Begin(String),

    /// The closure succeeded but the commit failed. Effects are lost.
    #[error("failed to commit transaction: {0}")]
    Commit(String),

    /// A repository call inside the closure failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The closure failed and the rollback failed too. The closure's error
    /// stays reachable as the source; the rollback failure is attached, not
    /// a replacement.
    #[error("transaction failed and rollback also failed: {rollback}")]
    RollbackFailed {
        /// The error that triggered the rollback.
        #[source]
        cause: Box<TransactionError>,
        /// Why the rollback itself failed.
        rollback: String,
    },
}

/// A transactional scope over the biller and product-biller stores.
///
/// Implementations come in two flavors sharing one contract:
///
/// - A *root* unit of work (built from a pool or shared state) whose
///   [`execute`](UnitOfWork::execute) opens a transaction, runs the closure
///   against a scoped copy of itself, commits on `Ok` and rolls back on
///   `Err`.
/// - The *scoped* unit of work handed to the closure, whose repositories
///   route through the open transaction and whose own `execute` runs the
///   closure directly: nested calls reuse the transaction in flight, and
///   only the outermost call commits or rolls back.
///
/// A panic inside the closure rolls the transaction back and then resumes
/// unwinding; panics are never converted into an `Err`.
pub trait UnitOfWork: Clone + Send + Sync {
    /// Product-biller link store bound to this scope.
    type Links: ProductBillerRepository;
    /// Biller store bound to this scope.
    type Billers: BillerRepository;

    /// Repository handle for product-biller links. Inside
    /// [`execute`](UnitOfWork::execute) the handle participates in the open
    /// transaction; outside, calls run non-transactionally.
    fn links(&self) -> Self::Links;

    /// Repository handle for billers, scoped the same way as
    /// [`links`](UnitOfWork::links).
    fn billers(&self) -> Self::Billers;

    /// Run `f` transactionally.
    ///
    /// All repository calls made through the unit of work passed to `f`
    /// take effect together or not at all.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::Begin`] when the transaction cannot be opened.
    /// - Whatever `f` returned, unchanged, when the rollback it triggered
    ///   succeeded.
    /// - [`TransactionError::RollbackFailed`] when the rollback failed too,
    ///   with `f`'s error as the source.
    /// - [`TransactionError::Commit`] when `f` succeeded but the commit
    ///   failed.
    fn execute<T, F, Fut>(
        &self,
        f: F,
    ) -> impl std::future::Future<Output = Result<T, TransactionError>> + Send
    where
        T: Send,
        F: FnOnce(Self) -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, TransactionError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_pass_through_transparently() {
        let err = TransactionError::from(RepositoryError::NotFound);
        assert_eq!(err.to_string(), "record not found");
    }

    #[test]
    fn rollback_failure_keeps_the_cause_as_source() {
        let cause = TransactionError::from(RepositoryError::Database(
            "insert failed".to_string(),
        ));
        let err = TransactionError::RollbackFailed {
            cause: Box::new(cause),
            rollback: "connection closed".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "transaction failed and rollback also failed: connection closed"
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("database error: insert failed"));
    }

    #[test]
    fn begin_and_commit_failures_name_the_phase() {
        assert_eq!(
            TransactionError::Begin("pool exhausted".to_string()).to_string(),
            "failed to begin transaction: pool exhausted"
        );
        assert_eq!(
            TransactionError::Commit("connection reset".to_string()).to_string(),
            "failed to commit transaction: connection reset"
        );
    }
}
