//! `PostgreSQL` store for billers.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use catalink_core::biller::{Biller, NewBiller};
use catalink_core::repository::{BillerRepository, RepositoryError};

use crate::session::{PgSession, map_db_error};

/// `PostgreSQL`-backed [`BillerRepository`] with soft deletes.
#[derive(Clone)]
pub struct PgBillerRepository {
    session: PgSession,
}

impl PgBillerRepository {
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

fn row_to_biller(row: &PgRow) -> Biller {
    Biller {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
        deleted_at: row.get("deleted_at"),
        deleted_by: row.get("deleted_by"),
    }
}

impl BillerRepository for PgBillerRepository {
    async fn create(&self, biller: &NewBiller) -> Result<Biller, RepositoryError> {
        let row = self
            .session
            .fetch_optional(
                sqlx::query(
                    r"
                    INSERT INTO billers (name, created_by, updated_by)
                    VALUES ($1, $2, $2)
                    RETURNING id, name, created_at, created_by,
                              updated_at, updated_by, deleted_at, deleted_by
                    ",
                )
                .bind(&biller.name)
                .bind(&biller.created_by),
            )
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| RepositoryError::Database("insert returned no row".to_string()))?;

        let created = row_to_biller(&row);
        tracing::debug!(biller_id = created.id, name = %created.name, "Created biller");
        Ok(created)
    }

    async fn fetch_one(&self, id: i64) -> Result<Biller, RepositoryError> {
        let row = self
            .session
            .fetch_optional(
                sqlx::query(
                    r"
                    SELECT id, name, created_at, created_by,
                           updated_at, updated_by, deleted_at, deleted_by
                    FROM billers
                    WHERE id = $1 AND deleted_at IS NULL
                    ",
                )
                .bind(id),
            )
            .await
            .map_err(map_db_error)?
            .ok_or(RepositoryError::NotFound)?;

        Ok(row_to_biller(&row))
    }

    async fn delete(&self, id: i64, actor: &str) -> Result<(), RepositoryError> {
        let result = self
            .session
            .execute(
                sqlx::query(
                    r"
                    UPDATE billers
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
        tracing::debug!(biller_id = id, deleted_by = actor, "Soft-deleted biller");
        Ok(())
    }
}
