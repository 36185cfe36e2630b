//! Biller domain model.
//!
//! Billers are the parent entity of product-biller links. This crate only
//! needs them where the unit of work composes writes across repositories
//! (deleting a biller cascades over its links), so the model stays minimal:
//! identity, a display name, and the same audit/soft-delete columns the link
//! rows carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A biller with audit and soft-delete columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Biller {
    /// Surrogate primary key.
    pub id: i64,
    /// Display name.
    pub name: String,
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

impl Biller {
    /// Whether the row has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Payload for creating a new biller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBiller {
    /// Display name.
    pub name: String,
    /// Principal recorded as the creator.
    pub created_by: String,
}

impl NewBiller {
    /// Create a new biller payload.
    #[must_use]
    pub fn new(name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_by: created_by.into(),
        }
    }
}
