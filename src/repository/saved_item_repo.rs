use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::model::saved_item::SavedItem;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::util::db_retry::{with_db_retry, RetryPolicy};

#[async_trait]
pub trait SavedItemRepository: Send + Sync {
    async fn insert(&self, item: SavedItem) -> RepositoryResult<SavedItem>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<SavedItem>>;
    async fn update(&self, item: &SavedItem) -> RepositoryResult<SavedItem>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()>;
    async fn list(&self, user_id: Uuid, search: Option<&str>) -> RepositoryResult<Vec<SavedItem>>;
}

pub struct PgSavedItemRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgSavedItemRepository {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        PgSavedItemRepository { pool, retry }
    }
}

#[async_trait]
impl SavedItemRepository for PgSavedItemRepository {
    #[tracing::instrument(skip(self, item), fields(user_id = %item.user_id))]
    async fn insert(&self, item: SavedItem) -> RepositoryResult<SavedItem> {
        let item = &item;
        let result = with_db_retry(&self.retry, "saved_items.insert", || {
            sqlx::query_as::<_, SavedItem>(
                r#"INSERT INTO saved_items (id, user_id, description, unit_price_cents, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *"#,
            )
            .bind(item.id)
            .bind(item.user_id)
            .bind(&item.description)
            .bind(item.unit_price_cents)
            .bind(item.created_at)
            .bind(item.updated_at)
            .fetch_one(&self.pool)
        })
        .await;

        match result {
            Ok(created) => {
                info!(item_id = %created.id, "Saved item created");
                Ok(created)
            }
            Err(e) => {
                error!("Failed to create saved item: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<SavedItem>> {
        with_db_retry(&self.retry, "saved_items.find", || {
            sqlx::query_as::<_, SavedItem>("SELECT * FROM saved_items WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self, item), fields(item_id = %item.id))]
    async fn update(&self, item: &SavedItem) -> RepositoryResult<SavedItem> {
        let result = with_db_retry(&self.retry, "saved_items.update", || {
            sqlx::query_as::<_, SavedItem>(
                r#"UPDATE saved_items SET description = $3, unit_price_cents = $4, updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING *"#,
            )
            .bind(item.id)
            .bind(item.user_id)
            .bind(&item.description)
            .bind(item.unit_price_cents)
            .fetch_optional(&self.pool)
        })
        .await;

        match result {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => Err(RepositoryError::not_found(format!("Saved item {} not found", item.id))),
            Err(e) => {
                error!("Failed to update saved item: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let result = with_db_retry(&self.retry, "saved_items.delete", || {
            sqlx::query("DELETE FROM saved_items WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(format!("Saved item {} not found", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, user_id: Uuid, search: Option<&str>) -> RepositoryResult<Vec<SavedItem>> {
        with_db_retry(&self.retry, "saved_items.list", || {
            sqlx::query_as::<_, SavedItem>(
                r#"SELECT * FROM saved_items
                WHERE user_id = $1 AND ($2::TEXT IS NULL OR description ILIKE '%' || $2 || '%')
                ORDER BY description ASC"#,
            )
            .bind(user_id)
            .bind(search)
            .fetch_all(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }
}
