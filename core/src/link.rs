//! Product-biller link domain model.
//!
//! A [`ProductBiller`] row associates a product with a biller and carries an
//! `is_active` flag plus full audit columns. Rows are soft-deleted: removal
//! stamps `deleted_at`/`deleted_by` and excludes the row from live queries,
//! the data itself is never destroyed by this crate.
//!
//! Queries are described by [`ProductBillerFilter`], a typed value object that
//! replaces ad-hoc key/value filter maps: every condition the repository layer
//! understands is a named field here, so an unknown filter key cannot compile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product-biller association with audit and soft-delete columns.
///
/// `(product_id, biller_id)` is unique among live (non-deleted) rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductBiller {
    /// Surrogate primary key.
    pub id: i64,
    /// Product side of the association.
    pub product_id: i64,
    /// Biller side of the association.
    pub biller_id: i64,
    /// Whether the link currently participates in routing.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Principal that created the row.
    pub created_by: String,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Principal that performed the last update.
    pub updated_by: String,
    /// Soft-delete timestamp; `None` while the row is live.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Principal that soft-deleted the row.
    pub deleted_by: Option<String>,
}

impl ProductBiller {
    /// Whether the row has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Payload for creating a new product-biller link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductBiller {
    /// Product side of the association.
    pub product_id: i64,
    /// Biller side of the association.
    pub biller_id: i64,
    /// Initial activation state.
    pub is_active: bool,
    /// Principal recorded as the creator.
    pub created_by: String,
}

impl NewProductBiller {
    /// Create a new link payload, active by default.
    #[must_use]
    pub fn new(product_id: i64, biller_id: i64, created_by: impl Into<String>) -> Self {
        Self {
            product_id,
            biller_id,
            is_active: true,
            created_by: created_by.into(),
        }
    }

    /// Override the initial activation state.
    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

/// Typed partial update for a product-biller link.
///
/// Fields left as `None` keep their current value. The repository stamps
/// `updated_at`/`updated_by` on every update regardless of which fields
/// change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductBillerChanges {
    /// New activation state, if it should change.
    pub is_active: Option<bool>,
}

impl ProductBillerChanges {
    /// Changes that deactivate the link.
    #[must_use]
    pub const fn deactivate() -> Self {
        Self {
            is_active: Some(false),
        }
    }

    /// Changes that activate the link.
    #[must_use]
    pub const fn activate() -> Self {
        Self {
            is_active: Some(true),
        }
    }
}

/// Page bounds for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows to return.
    pub limit: i64,
    /// Number of rows to skip.
    pub offset: i64,
}

impl Page {
    /// Create page bounds.
    #[must_use]
    pub const fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

/// Typed query filter for product-biller links.
///
/// Every condition is optional; an empty filter matches all live rows.
/// Soft-deleted rows are excluded unless [`with_deleted`](Self::with_deleted)
/// is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductBillerFilter {
    /// Restrict to links of this product.
    pub product_id: Option<i64>,
    /// Restrict to links of this biller.
    pub biller_id: Option<i64>,
    /// Restrict to links with this activation state.
    pub is_active: Option<bool>,
    /// Include soft-deleted rows in the result.
    pub include_deleted: bool,
    /// Page bounds; `None` returns all matches.
    pub page: Option<Page>,
}

impl ProductBillerFilter {
    /// An empty filter matching all live rows.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            product_id: None,
            biller_id: None,
            is_active: None,
            include_deleted: false,
            page: None,
        }
    }

    /// Restrict to links of the given product.
    #[must_use]
    pub const fn with_product(mut self, product_id: i64) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// Restrict to links of the given biller.
    #[must_use]
    pub const fn with_biller(mut self, biller_id: i64) -> Self {
        self.biller_id = Some(biller_id);
        self
    }

    /// Restrict to links with the given activation state.
    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    /// Include soft-deleted rows in the result.
    #[must_use]
    pub const fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Apply page bounds to the result.
    #[must_use]
    pub const fn with_page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_builder_composes_conditions() {
        let filter = ProductBillerFilter::new()
            .with_product(1)
            .with_biller(2)
            .with_active(true)
            .with_page(Page::new(10, 20));

        assert_eq!(filter.product_id, Some(1));
        assert_eq!(filter.biller_id, Some(2));
        assert_eq!(filter.is_active, Some(true));
        assert!(!filter.include_deleted);
        assert_eq!(filter.page, Some(Page::new(10, 20)));
    }

    #[test]
    fn empty_filter_matches_live_rows_only() {
        let filter = ProductBillerFilter::default();

        assert_eq!(filter.product_id, None);
        assert_eq!(filter.biller_id, None);
        assert_eq!(filter.is_active, None);
        assert!(!filter.include_deleted);
    }

    #[test]
    fn deactivate_changes_only_touch_activation() {
        let changes = ProductBillerChanges::deactivate();
        assert_eq!(changes.is_active, Some(false));

        let noop = ProductBillerChanges::default();
        assert_eq!(noop.is_active, None);
    }

    #[test]
    fn new_link_is_active_by_default() {
        let link = NewProductBiller::new(1, 2, "tester");
        assert!(link.is_active);
        assert_eq!(link.created_by, "tester");

        let inactive = NewProductBiller::new(1, 2, "tester").with_active(false);
        assert!(!inactive.is_active);
    }
}
