//! In-memory repositories over shared vector-backed state.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::biller::{Biller, NewBiller};
use crate::link::{NewProductBiller, ProductBiller, ProductBillerChanges, ProductBillerFilter};
use crate::repository::{BillerRepository, ProductBillerRepository, RepositoryError};

/// Shared backing state for the in-memory repositories and unit of work.
#[derive(Debug, Clone)]
pub(super) struct MemoryState {
    pub(super) links: Vec<ProductBiller>,
    pub(super) billers: Vec<Biller>,
    next_link_id: i64,
    next_biller_id: i64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            links: Vec::new(),
            billers: Vec::new(),
            next_link_id: 1,
            next_biller_id: 1,
        }
    }
}

fn lock_state(
    state: &Arc<Mutex<MemoryState>>,
) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
    state
        .lock()
        .map_err(|_| RepositoryError::Database("mutex lock failed".to_string()))
}

fn matches(link: &ProductBiller, filter: &ProductBillerFilter) -> bool {
    if filter.product_id.is_some_and(|id| link.product_id != id) {
        return false;
    }
    if filter.biller_id.is_some_and(|id| link.biller_id != id) {
        return false;
    }
    if filter.is_active.is_some_and(|a| link.is_active != a) {
        return false;
    }
    if !filter.include_deleted && link.is_deleted() {
        return false;
    }
    true
}

/// In-memory [`ProductBillerRepository`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLinkRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryLinkRepository {
    /// Create an empty repository with its own state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn with_state(state: Arc<Mutex<MemoryState>>) -> Self {
        Self { state }
    }
}

impl ProductBillerRepository for InMemoryLinkRepository {
    async fn create(&self, link: &NewProductBiller) -> Result<ProductBiller, RepositoryError> {
        let mut state = lock_state(&self.state)?;

        let live_pair_exists = state.links.iter().any(|existing| {
            existing.product_id == link.product_id
                && existing.biller_id == link.biller_id
                && !existing.is_deleted()
        });
        if live_pair_exists {
            return Err(RepositoryError::Duplicate(format!(
                "product {} / biller {}",
                link.product_id, link.biller_id
            )));
        }

        let now = Utc::now();
        let row = ProductBiller {
            id: state.next_link_id,
            product_id: link.product_id,
            biller_id: link.biller_id,
            is_active: link.is_active,
            created_at: now,
            created_by: link.created_by.clone(),
            updated_at: now,
            updated_by: link.created_by.clone(),
            deleted_at: None,
            deleted_by: None,
        };
        state.next_link_id += 1;
        state.links.push(row.clone());
        tracing::debug!(link_id = row.id, "mock link created");
        Ok(row)
    }

    async fn fetch_one(&self, id: i64) -> Result<ProductBiller, RepositoryError> {
        let state = lock_state(&self.state)?;
        state
            .links
            .iter()
            .find(|link| link.id == id && !link.is_deleted())
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn fetch_by_subject(
        &self,
        product_id: i64,
        biller_id: i64,
    ) -> Result<ProductBiller, RepositoryError> {
        let state = lock_state(&self.state)?;
        state
            .links
            .iter()
            .find(|link| {
                link.product_id == product_id && link.biller_id == biller_id && !link.is_deleted()
            })
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn fetch_many(
        &self,
        filter: &ProductBillerFilter,
    ) -> Result<Vec<ProductBiller>, RepositoryError> {
        let state = lock_state(&self.state)?;
        let mut rows: Vec<ProductBiller> = state
            .links
            .iter()
            .filter(|link| matches(link, filter))
            .cloned()
            .collect();
        rows.sort_unstable_by(|a, b| b.id.cmp(&a.id));

        if let Some(page) = filter.page {
            let offset = usize::try_from(page.offset).unwrap_or(0);
            let limit = usize::try_from(page.limit).unwrap_or(0);
            rows = rows.into_iter().skip(offset).take(limit).collect();
        }
        Ok(rows)
    }

    async fn update(
        &self,
        id: i64,
        changes: &ProductBillerChanges,
        actor: &str,
    ) -> Result<ProductBiller, RepositoryError> {
        let mut state = lock_state(&self.state)?;
        let link = state
            .links
            .iter_mut()
            .find(|link| link.id == id && !link.is_deleted())
            .ok_or(RepositoryError::NotFound)?;

        if let Some(is_active) = changes.is_active {
            link.is_active = is_active;
        }
        link.updated_at = Utc::now();
        link.updated_by = actor.to_string();
        Ok(link.clone())
    }

    async fn delete(&self, id: i64, actor: &str) -> Result<(), RepositoryError> {
        let mut state = lock_state(&self.state)?;
        let link = state
            .links
            .iter_mut()
            .find(|link| link.id == id && !link.is_deleted())
            .ok_or(RepositoryError::NotFound)?;

        link.deleted_at = Some(Utc::now());
        link.deleted_by = Some(actor.to_string());
        Ok(())
    }

    async fn delete_by_product(
        &self,
        product_id: i64,
        actor: &str,
    ) -> Result<u64, RepositoryError> {
        let mut state = lock_state(&self.state)?;
        let now = Utc::now();
        let mut removed = 0;
        for link in state
            .links
            .iter_mut()
            .filter(|link| link.product_id == product_id && !link.is_deleted())
        {
            link.deleted_at = Some(now);
            link.deleted_by = Some(actor.to_string());
            removed += 1;
        }
        Ok(removed)
    }

    async fn delete_by_biller(&self, biller_id: i64, actor: &str) -> Result<u64, RepositoryError> {
        let mut state = lock_state(&self.state)?;
        let now = Utc::now();
        let mut removed = 0;
        for link in state
            .links
            .iter_mut()
            .filter(|link| link.biller_id == biller_id && !link.is_deleted())
        {
            link.deleted_at = Some(now);
            link.deleted_by = Some(actor.to_string());
            removed += 1;
        }
        Ok(removed)
    }
}

/// In-memory [`BillerRepository`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillerRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryBillerRepository {
    /// Create an empty repository with its own state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn with_state(state: Arc<Mutex<MemoryState>>) -> Self {
        Self { state }
    }
}

impl BillerRepository for InMemoryBillerRepository {
    async fn create(&self, biller: &NewBiller) -> Result<Biller, RepositoryError> {
        let mut state = lock_state(&self.state)?;
        let now = Utc::now();
        let row = Biller {
            id: state.next_biller_id,
            name: biller.name.clone(),
            created_at: now,
            created_by: biller.created_by.clone(),
            updated_at: now,
            updated_by: biller.created_by.clone(),
            deleted_at: None,
            deleted_by: None,
        };
        state.next_biller_id += 1;
        state.billers.push(row.clone());
        Ok(row)
    }

    async fn fetch_one(&self, id: i64) -> Result<Biller, RepositoryError> {
        let state = lock_state(&self.state)?;
        state
            .billers
            .iter()
            .find(|biller| biller.id == id && !biller.is_deleted())
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: i64, actor: &str) -> Result<(), RepositoryError> {
        let mut state = lock_state(&self.state)?;
        let biller = state
            .billers
            .iter_mut()
            .find(|biller| biller.id == id && !biller.is_deleted())
            .ok_or(RepositoryError::NotFound)?;

        biller.deleted_at = Some(Utc::now());
        biller.deleted_by = Some(actor.to_string());
        Ok(())
    }
}
