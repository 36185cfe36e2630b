//! In-memory test doubles.
//!
//! Everything here mirrors the contracts of the production backends closely
//! enough for concurrency and atomicity tests: the lock store honors TTLs
//! against the tokio clock and supports fault injection, the repositories
//! enforce uniqueness and soft-delete visibility, and the unit of work
//! snapshots shared state so rollback genuinely undoes the closure's writes.
//!
//! Available in `#[cfg(test)]` builds and behind the `test-utils` feature so
//! downstream crates can drive their own tests with the same doubles.

mod lock_store;
mod repository;
mod unit_of_work;

pub use lock_store::InMemoryLockStore;
pub use repository::{InMemoryBillerRepository, InMemoryLinkRepository};
pub use unit_of_work::InMemoryUnitOfWork;
