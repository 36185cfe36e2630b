//! `PostgreSQL` store for product-biller links.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use catalink_core::link::{
    NewProductBiller, ProductBiller, ProductBillerChanges, ProductBillerFilter,
};
use catalink_core::repository::{ProductBillerRepository, RepositoryError};

use crate::session::{PgSession, map_db_error};

/// `PostgreSQL`-backed [`ProductBillerRepository`].
///
/// Rows are soft-deleted: every read filters on `deleted_at IS NULL`, and a
/// partial unique index keeps at most one live link per
/// `(product_id, biller_id)` pair while letting deleted pairs be re-linked.
#[derive(Clone)]
pub struct PgLinkRepository {
    session: PgSession,
}

impl PgLinkRepository {
    /// Create a pool-backed repository (calls run outside any transaction).
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self {
            session: PgSession::over_pool(pool),
        }
    }

    pub(crate) const fn with_session(session: PgSession) -> Self {
        Self { session }
    }
}

fn row_to_link(row: &PgRow) -> ProductBiller {
    ProductBiller {
        id: row.get("id"),
        product_id: row.get("product_id"),
        biller_id: row.get("biller_id"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
        deleted_at: row.get("deleted_at"),
        deleted_by: row.get("deleted_by"),
    }
}

impl ProductBillerRepository for PgLinkRepository {
    async fn create(&self, link: &NewProductBiller) -> Result<ProductBiller, RepositoryError> {
        let row = self
            .session
            .fetch_optional(
                sqlx::query(
                    r"
                    INSERT INTO product_billers (product_id, biller_id, is_active, created_by, updated_by)
                    VALUES ($1, $2, $3, $4, $4)
                    RETURNING id, product_id, biller_id, is_active,
                              created_at, created_by, updated_at, updated_by,
                              deleted_at, deleted_by
                    ",
                )
                .bind(link.product_id)
                .bind(link.biller_id)
                .bind(link.is_active)
                .bind(&link.created_by),
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::Database("insert returned no row".to_string()))?;

        let created = row_to_link(&row);
        tracing::debug!(
            link_id = created.id,
            product_id = created.product_id,
            biller_id = created.biller_id,
            "Created product-biller link"
        );
        Ok(created)
    }

    async fn fetch_one(&self, id: i64) -> Result<ProductBiller, RepositoryError> {
        let row = self
            .session
            .fetch_optional(
                sqlx::query(
                    r"
                    SELECT id, product_id, biller_id, is_active,
                           created_at, created_by, updated_at, updated_by,
                           deleted_at, deleted_by
                    FROM product_billers
                    WHERE id = $1 AND deleted_at IS NULL
                    ",
                )
                .bind(id),
            )
            .await
            .map_err(map_db_error)?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row_to_link(&row))
    }

    async fn fetch_by_subject(
        &self,
        product_id: i64,
        biller_id: i64,
    ) -> Result<ProductBiller, RepositoryError> {
        let row = self
            .session
            .fetch_optional(
                sqlx::query(
                    r"
                    SELECT id, product_id, biller_id, is_active,
                           created_at, created_by, updated_at, updated_by,
                           deleted_at, deleted_by
                    FROM product_billers
                    WHERE product_id = $1 AND biller_id = $2 AND deleted_at IS NULL
                    ",
                )
                .bind(product_id)
                .bind(biller_id),
            )
            .await
            .map_err(map_db_error)?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row_to_link(&row))
    }

    async fn fetch_many(
        &self,
        filter: &ProductBillerFilter,
    ) -> Result<Vec<ProductBiller>, RepositoryError> {
        let (limit, offset) = filter
            .page
            .map_or((None, None), |page| (Some(page.limit), Some(page.offset)));

        let rows = self
            .session
            .fetch_all(
                sqlx::query(
                    r"
                    SELECT id, product_id, biller_id, is_active,
                           created_at, created_by, updated_at, updated_by,
                           deleted_at, deleted_by
                    FROM product_billers
                    WHERE ($1::BIGINT IS NULL OR product_id = $1)
                      AND ($2::BIGINT IS NULL OR biller_id = $2)
                      AND ($3::BOOLEAN IS NULL OR is_active = $3)
                      AND ($4::BOOLEAN OR deleted_at IS NULL)
                    ORDER BY id DESC
                    LIMIT $5 OFFSET $6
                    ",
                )
                .bind(filter.product_id)
                .bind(filter.biller_id)
                .bind(filter.is_active)
                .bind(filter.include_deleted)
                .bind(limit)
                .bind(offset),
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows.iter().map(row_to_link).collect())
    }

    async fn update(
        &self,
        id: i64,
        changes: &ProductBillerChanges,
        actor: &str,
    ) -> Result<ProductBiller, RepositoryError> {
        let row = self
            .session
            .fetch_optional(
                sqlx::query(
                    r"
                    UPDATE product_billers
                    SET is_active = COALESCE($2, is_active),
                        updated_at = NOW(),
                        updated_by = $3
                    WHERE id = $1 AND deleted_at IS NULL
                    RETURNING id, product_id, biller_id, is_active,
                              created_at, created_by, updated_at, updated_by,
                              deleted_at, deleted_by
                    ",
                )
                .bind(id)
                .bind(changes.is_active)
                .bind(actor),
            )
            .await
            .map_err(map_db_error)?
            .ok_or(RepositoryError::NotFound)?;

        let updated = row_to_link(&row);
        tracing::debug!(
            link_id = updated.id,
            is_active = updated.is_active,
            updated_by = actor,
            "Updated product-biller link"
        );
        Ok(updated)
    }

    async fn delete(&self, id: i64, actor: &str) -> Result<(), RepositoryError> {
        let result = self
            .session
            .execute(
                sqlx::query(
                    r"
                    UPDATE product_billers
                    SET deleted_at = NOW(), deleted_by = $2
                    WHERE id = $1 AND deleted_at IS NULL
                    ",
                )
                .bind(id)
                .bind(actor),
            )
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        tracing::debug!(link_id = id, deleted_by = actor, "Soft-deleted product-biller link");
        Ok(())
    }

    async fn delete_by_product(
        &self,
        product_id: i64,
        actor: &str,
    ) -> Result<u64, RepositoryError> {
        let result = self
            .session
            .execute(
                sqlx::query(
                    r"
                    UPDATE product_billers
                    SET deleted_at = NOW(), deleted_by = $2
                    WHERE product_id = $1 AND deleted_at IS NULL
                    ",
                )
                .bind(product_id)
                .bind(actor),
            )
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_by_biller(&self, biller_id: i64, actor: &str) -> Result<u64, RepositoryError> {
        let result = self
            .session
            .execute(
                sqlx::query(
                    r"
                    UPDATE product_billers
                    SET deleted_at = NOW(), deleted_by = $2
                    WHERE biller_id = $1 AND deleted_at IS NULL
                    ",
                )
                .bind(biller_id)
                .bind(actor),
            )
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}
