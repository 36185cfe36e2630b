//! `PostgreSQL` persistence for catalink.
//!
//! This crate provides the production implementations of the repository and
//! unit-of-work seams from `catalink-core`:
//!
//! - [`PgLinkRepository`] / [`PgBillerRepository`]: soft-deleting stores
//!   with audit stamps on every mutation
//! - [`PgUnitOfWork`]: closure-scoped transactions with nested reuse and
//!   panic-safe rollback
//!
//! Repositories can run standalone over a pool or inside a unit of work;
//! the handles the closure receives route through the open transaction.
//!
//! # Example
//!
//! ```ignore
//! use catalink_core::unit_of_work::UnitOfWork;
//! use catalink_postgres::PgUnitOfWork;
//!
//! async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let uow = PgUnitOfWork::new(pool);
//!     let removed = catalink_core::cascade::remove_biller(&uow, 42, "admin").await?;
//!     println!("removed {removed} links");
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod biller_repository;
mod link_repository;
mod session;
mod unit_of_work;

pub use biller_repository::PgBillerRepository;
pub use link_repository::PgLinkRepository;
pub use unit_of_work::PgUnitOfWork;
