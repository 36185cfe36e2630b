//! Persistence seams for billers and product-biller links.
//!
//! The traits here are implemented once per backend (Postgres in
//! production, in-memory doubles for tests) and once per unit-of-work
//! session, so the same repository calls run against a pool or inside an
//! open transaction depending on where the handle came from.

use thiserror::Error;

use crate::biller::{Biller, NewBiller};
use crate::link::{NewProductBiller, ProductBiller, ProductBillerChanges, ProductBillerFilter};

/// Errors surfaced by repository operations.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The backing store failed or was unreachable.
    #[error("database error: {0}")]
    Database(String),

    /// The targeted row does not exist (or is soft-deleted).
    #[error("record not found")]
    NotFound,

    /// An insert collided with a uniqueness constraint.
    #[error("duplicate record: {0}")]
    Duplicate(String),
}

/// Store of product-biller links.
pub trait ProductBillerRepository: Send + Sync {
    /// Insert a new link and return it with its generated id and audit
    /// stamps.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::Duplicate`] when a live link for the same
    ///   `(product_id, biller_id)` pair already exists.
    /// - [`RepositoryError::Database`] on store failure.
    fn create(
        &self,
        link: &NewProductBiller,
    ) -> impl std::future::Future<Output = Result<ProductBiller, RepositoryError>> + Send;

    /// Fetch a link by id. Soft-deleted links are invisible.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] when no live link has this id.
    /// - [`RepositoryError::Database`] on store failure.
    fn fetch_one(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<ProductBiller, RepositoryError>> + Send;

    /// Fetch the live link for a `(product_id, biller_id)` pair.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] when the pair has no live link.
    /// - [`RepositoryError::Database`] on store failure.
    fn fetch_by_subject(
        &self,
        product_id: i64,
        biller_id: i64,
    ) -> impl std::future::Future<Output = Result<ProductBiller, RepositoryError>> + Send;

    /// List links matching `filter`, newest id first.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure. An empty
    /// result is `Ok(vec![])`, not an error.
    fn fetch_many(
        &self,
        filter: &ProductBillerFilter,
    ) -> impl std::future::Future<Output = Result<Vec<ProductBiller>, RepositoryError>> + Send;

    /// Apply `changes` to the link with `id`, stamping `actor` as the
    /// updater, and return the updated row.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] when no live link has this id.
    /// - [`RepositoryError::Database`] on store failure.
    fn update(
        &self,
        id: i64,
        changes: &ProductBillerChanges,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<ProductBiller, RepositoryError>> + Send;

    /// Soft-delete the link with `id`, stamping `actor`.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] when no live link has this id.
    /// - [`RepositoryError::Database`] on store failure.
    fn delete(
        &self,
        id: i64,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Soft-delete every live link of a product. Returns the number of
    /// links removed; zero is a valid outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    fn delete_by_product(
        &self,
        product_id: i64,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Soft-delete every live link of a biller. Returns the number of
    /// links removed; zero is a valid outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    fn delete_by_biller(
        &self,
        biller_id: i64,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Store of billers.
pub trait BillerRepository: Send + Sync {
    /// Insert a new biller and return it with its generated id and audit
    /// stamps.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    fn create(
        &self,
        biller: &NewBiller,
    ) -> impl std::future::Future<Output = Result<Biller, RepositoryError>> + Send;

    /// Fetch a biller by id. Soft-deleted billers are invisible.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] when no live biller has this id.
    /// - [`RepositoryError::Database`] on store failure.
    fn fetch_one(
        &self,
        id: i64,
    ) -> impl std::future::Future<Output = Result<Biller, RepositoryError>> + Send;

    /// Soft-delete the biller with `id`, stamping `actor`.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] when no live biller has this id.
    /// - [`RepositoryError::Database`] on store failure.
    fn delete(
        &self,
        id: i64,
        actor: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_terse() {
        assert_eq!(RepositoryError::NotFound.to_string(), "record not found");
        assert_eq!(
            RepositoryError::Duplicate("product 1 / biller 2".to_string()).to_string(),
            "duplicate record: product 1 / biller 2"
        );
        assert_eq!(
            RepositoryError::Database("connection reset".to_string()).to_string(),
            "database error: connection reset"
        );
    }
}
