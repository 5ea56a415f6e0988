use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::model::notification::Notification;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::util::db_retry::{with_db_retry, RetryPolicy};

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: Notification) -> RepositoryResult<Notification>;
    async fn list(&self, user_id: Uuid, unread_only: bool, limit: u32) -> RepositoryResult<Vec<Notification>>;
    async fn count_unread(&self, user_id: Uuid) -> RepositoryResult<i64>;
    /// Returns `false` when the notification does not belong to the user.
    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<bool>;
    async fn mark_all_read(&self, user_id: Uuid, at: DateTime<Utc>) -> RepositoryResult<u64>;
}

pub struct PgNotificationRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        PgNotificationRepository { pool, retry }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    #[tracing::instrument(skip(self, notification), fields(user_id = %notification.user_id, kind = ?notification.kind))]
    async fn insert(&self, notification: Notification) -> RepositoryResult<Notification> {
        let n = &notification;
        with_db_retry(&self.retry, "notifications.insert", || {
            sqlx::query_as::<_, Notification>(
                r#"INSERT INTO notifications (id, user_id, kind, title, message, quote_id, read_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING *"#,
            )
            .bind(n.id)
            .bind(n.user_id)
            .bind(n.kind)
            .bind(&n.title)
            .bind(&n.message)
            .bind(n.quote_id)
            .bind(n.read_at)
            .bind(n.created_at)
            .fetch_one(&self.pool)
        })
        .await
        .map_err(|e| {
            error!("Failed to store notification: {}", e);
            RepositoryError::from(e)
        })
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, user_id: Uuid, unread_only: bool, limit: u32) -> RepositoryResult<Vec<Notification>> {
        with_db_retry(&self.retry, "notifications.list", || {
            sqlx::query_as::<_, Notification>(
                r#"SELECT * FROM notifications
                WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
                ORDER BY created_at DESC LIMIT $3"#,
            )
            .bind(user_id)
            .bind(unread_only)
            .bind(limit as i64)
            .fetch_all(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn count_unread(&self, user_id: Uuid) -> RepositoryResult<i64> {
        with_db_retry(&self.retry, "notifications.count_unread", || {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL")
                .bind(user_id)
                .fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_read(&self, user_id: Uuid, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<bool> {
        let result = with_db_retry(&self.retry, "notifications.mark_read", || {
            sqlx::query(
                "UPDATE notifications SET read_at = COALESCE(read_at, $3) WHERE id = $1 AND user_id = $2",
            )
            .bind(id)
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_all_read(&self, user_id: Uuid, at: DateTime<Utc>) -> RepositoryResult<u64> {
        let result = with_db_retry(&self.retry, "notifications.mark_all_read", || {
            sqlx::query("UPDATE notifications SET read_at = $2 WHERE user_id = $1 AND read_at IS NULL")
                .bind(user_id)
                .bind(at)
                .execute(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)?;
        Ok(result.rows_affected())
    }
}
