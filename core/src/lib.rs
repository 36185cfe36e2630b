//! # Catalink Core
//!
//! Domain model and concurrency-safety core for the catalink worker: the
//! pieces that keep product-biller links consistent when transition events
//! arrive late, twice, or in parallel.
//!
//! ## Building Blocks
//!
//! - **Distributed lock**: TTL-backed mutual exclusion over a shared store,
//!   with bounded and cancellable retries ([`lock`])
//! - **Unit of work**: closure-scoped transactions with nested reuse and
//!   panic-safe rollback ([`unit_of_work`])
//! - **Transition processor**: idempotent deactivation of the link a failed
//!   transition refers to ([`processor`])
//!
//! Production backends live in companion crates (`catalink-redis` for the
//! lock store, `catalink-postgres` for repositories and the unit of work,
//! `catalink-worker` for the Kafka consumer binary). In-memory doubles for
//! every seam ship in the `mocks` module behind the `test-utils` feature.

pub mod biller;
pub mod cascade;
pub mod event;
pub mod link;
pub mod lock;
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;
pub mod processor;
pub mod repository;
pub mod unit_of_work;

pub use biller::{Biller, NewBiller};
pub use cascade::remove_biller;
pub use event::{TransitionEvent, TransitionStatus};
pub use link::{NewProductBiller, Page, ProductBiller, ProductBillerChanges, ProductBillerFilter};
pub use lock::{DistributedLock, LockConfig, LockError, LockStore};
pub use processor::{ProcessError, TransitionOutcome, TransitionProcessor, TRANSITION_ACTOR};
pub use repository::{BillerRepository, ProductBillerRepository, RepositoryError};
pub use unit_of_work::{TransactionError, UnitOfWork};
