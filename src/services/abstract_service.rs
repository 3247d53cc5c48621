use async_trait::async_trait;
use serde::Serialize;

use crate::db::query::{Entity, Join, PageQuery, Predicate, SortKey};
use crate::db::repository::EntityRepository;
use crate::models::{Page, PageMeta, PageOptions};
use crate::{AppError, Result};

/// Lookup, paging and soft-delete shared by every entity service.
#[async_trait]
pub trait AbstractService<E: Entity>: Send + Sync {
    type Repository: EntityRepository<E> + ?Sized;

    fn repository(&self) -> &Self::Repository;

    fn entity_name(&self) -> &'static str {
        E::TABLE
    }

    async fn find_one(&self, criteria: &[Predicate]) -> Result<Option<E>> {
        self.repository().find_one(criteria).await
    }

    async fn find_one_or(&self, criteria: &[Predicate], error: AppError) -> Result<E> {
        self.find_one(criteria).await?.ok_or(error)
    }

    /// One page of `E` filtered by the fields of `options` and `filters`,
    /// optionally narrowed through joined relations and sorted by `sorting`
    /// (defaults to `created_at` in `options.order`).
    async fn paginate<F, D>(
        &self,
        options: &PageOptions,
        filters: &F,
        joins: &[Join],
        relation_filters: &[Predicate],
        sorting: &[SortKey],
    ) -> Result<Page<D>>
    where
        F: Serialize + Sync + ?Sized,
        D: From<E> + Send,
    {
        let query = PageQuery::compose::<E, F>(options, filters, joins, relation_filters, sorting)?;
        let (rows, item_count) = self.repository().paginate(&query).await?;

        tracing::debug!(
            entity = self.entity_name(),
            page = query.page,
            take = query.take,
            item_count,
            "Paginated"
        );

        let data = rows.into_iter().map(D::from).collect();
        Ok(Page::new(data, PageMeta::new(query.page, query.take, item_count)))
    }

    /// Soft-deletes every match; `true` when at least one row was hit.
    async fn delete(&self, criteria: &[Predicate]) -> Result<bool> {
        let affected = self.repository().soft_delete(criteria).await?;
        Ok(affected > 0)
    }
}
