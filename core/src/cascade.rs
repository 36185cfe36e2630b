//! Cross-aggregate removals that must land atomically.

use crate::repository::{BillerRepository, ProductBillerRepository};
use crate::unit_of_work::{TransactionError, UnitOfWork};

/// Soft-delete a biller together with every live link that references it.
///
/// Both removals run in one transaction: a biller is never left deleted
/// while its links stay live, and vice versa. Stamps `actor` on every
/// touched row and returns the number of links removed.
///
/// Composes with an already-open transaction: when `uow` is the scoped
/// handle inside [`UnitOfWork::execute`], the removal joins that
/// transaction instead of opening its own.
///
/// # Errors
///
/// - [`TransactionError::Repository`] when the biller does not exist or a
///   store call fails; no partial removal survives.
/// - Transaction lifecycle failures as described on
///   [`UnitOfWork::execute`].
pub async fn remove_biller<U: UnitOfWork>(
    uow: &U,
    biller_id: i64,
    actor: &str,
) -> Result<u64, TransactionError> {
    let actor = actor.to_owned();
    uow.execute(move |tx| async move {
        let links_removed = tx.links().delete_by_biller(biller_id, &actor).await?;
        tx.billers().delete(biller_id, &actor).await?;
        tracing::info!(
            biller_id = biller_id,
            links_removed = links_removed,
            "biller removed with its links"
        );
        Ok(links_removed)
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::biller::NewBiller;
    use crate::link::{NewProductBiller, ProductBillerFilter};
    use crate::mocks::InMemoryUnitOfWork;
    use crate::repository::RepositoryError;

    async fn seed_biller_with_links(uow: &InMemoryUnitOfWork) -> i64 {
        let biller = uow
            .billers()
            .create(&NewBiller::new("Acme Utilities", "seed"))
            .await
            .unwrap();
        uow.links()
            .create(&NewProductBiller::new(1, biller.id, "seed"))
            .await
            .unwrap();
        uow.links()
            .create(&NewProductBiller::new(2, biller.id, "seed"))
            .await
            .unwrap();
        biller.id
    }

    #[tokio::test]
    async fn removes_the_biller_and_all_its_links() {
        let uow = InMemoryUnitOfWork::new();
        let biller_id = seed_biller_with_links(&uow).await;
        let other = uow
            .billers()
            .create(&NewBiller::new("Other Biller", "seed"))
            .await
            .unwrap();
        uow.links()
            .create(&NewProductBiller::new(1, other.id, "seed"))
            .await
            .unwrap();

        let removed = remove_biller(&uow, biller_id, "admin").await.unwrap();
        assert_eq!(removed, 2);

        assert!(matches!(
            uow.billers().fetch_one(biller_id).await,
            Err(RepositoryError::NotFound)
        ));
        let live = uow
            .links()
            .fetch_many(&ProductBillerFilter::new())
            .await
            .unwrap();
        assert_eq!(live.len(), 1, "the other biller's link must survive");
        assert_eq!(live[0].biller_id, other.id);
    }

    #[tokio::test]
    async fn missing_biller_rolls_back_the_link_removal() {
        let uow = InMemoryUnitOfWork::new();
        // Links reference a biller row that was never created.
        uow.links()
            .create(&NewProductBiller::new(1, 42, "seed"))
            .await
            .unwrap();
        uow.links()
            .create(&NewProductBiller::new(2, 42, "seed"))
            .await
            .unwrap();

        let result = remove_biller(&uow, 42, "admin").await;

        assert!(matches!(
            result,
            Err(TransactionError::Repository(RepositoryError::NotFound))
        ));
        let live = uow
            .links()
            .fetch_many(&ProductBillerFilter::new().with_biller(42))
            .await
            .unwrap();
        assert_eq!(live.len(), 2, "link removal must not survive the rollback");
    }

    #[tokio::test]
    async fn composes_inside_an_open_transaction() {
        let uow = InMemoryUnitOfWork::new();
        let biller_id = seed_biller_with_links(&uow).await;

        let result: Result<(), TransactionError> = uow
            .execute(|tx| async move {
                remove_biller(&tx, biller_id, "admin").await?;
                Err(TransactionError::from(RepositoryError::Database(
                    "forced failure".to_string(),
                )))
            })
            .await;

        assert!(result.is_err());
        // The removal joined the outer transaction, so it rolled back too.
        uow.billers().fetch_one(biller_id).await.unwrap();
        let live = uow
            .links()
            .fetch_many(&ProductBillerFilter::new().with_biller(biller_id))
            .await
            .unwrap();
        assert_eq!(live.len(), 2);
    }
}
