use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::model::review::{RatingSummary, Review};
use crate::repository::database::offset;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::util::db_retry::{with_db_retry, RetryPolicy};

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn insert(&self, review: Review) -> RepositoryResult<Review>;
    async fn find_by_quote(&self, quote_id: Uuid) -> RepositoryResult<Option<Review>>;
    async fn list_by_user(&self, user_id: Uuid, page: u32, limit: u32) -> RepositoryResult<Vec<Review>>;
    async fn count_by_user(&self, user_id: Uuid) -> RepositoryResult<i64>;
    async fn respond(
        &self,
        user_id: Uuid,
        id: Uuid,
        response: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Review>>;
    async fn summary(&self, user_id: Uuid) -> RepositoryResult<RatingSummary>;
}

pub struct PgReviewRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgReviewRepository {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        PgReviewRepository { pool, retry }
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    #[tracing::instrument(skip(self, review), fields(quote_id = %review.quote_id, rating = review.rating))]
    async fn insert(&self, review: Review) -> RepositoryResult<Review> {
        let review = &review;
        let result = with_db_retry(&self.retry, "reviews.insert", || {
            sqlx::query_as::<_, Review>(
                r#"INSERT INTO reviews (id, user_id, client_id, quote_id, rating, comment, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *"#,
            )
            .bind(review.id)
            .bind(review.user_id)
            .bind(review.client_id)
            .bind(review.quote_id)
            .bind(review.rating)
            .bind(&review.comment)
            .bind(review.created_at)
            .fetch_one(&self.pool)
        })
        .await;

        match result {
            Ok(created) => {
                info!("Review stored");
                Ok(created)
            }
            Err(e) => {
                error!("Failed to store review: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_quote(&self, quote_id: Uuid) -> RepositoryResult<Option<Review>> {
        with_db_retry(&self.retry, "reviews.find_by_quote", || {
            sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE quote_id = $1")
                .bind(quote_id)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_user(&self, user_id: Uuid, page: u32, limit: u32) -> RepositoryResult<Vec<Review>> {
        with_db_retry(&self.retry, "reviews.list_by_user", || {
            sqlx::query_as::<_, Review>(
                "SELECT * FROM reviews WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            )
            .bind(user_id)
            .bind(limit as i64)
            .bind(offset(page, limit))
            .fetch_all(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn count_by_user(&self, user_id: Uuid) -> RepositoryResult<i64> {
        with_db_retry(&self.retry, "reviews.count_by_user", || {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self, response))]
    async fn respond(
        &self,
        user_id: Uuid,
        id: Uuid,
        response: &str,
        at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Review>> {
        with_db_retry(&self.retry, "reviews.respond", || {
            sqlx::query_as::<_, Review>(
                "UPDATE reviews SET response = $3, responded_at = $4 WHERE id = $1 AND user_id = $2 RETURNING *",
            )
            .bind(id)
            .bind(user_id)
            .bind(response)
            .bind(at)
            .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn summary(&self, user_id: Uuid) -> RepositoryResult<RatingSummary> {
        let (count, average) = with_db_retry(&self.retry, "reviews.summary", || {
            sqlx::query_as::<_, (i64, Option<f64>)>(
                "SELECT COUNT(*), AVG(rating)::DOUBLE PRECISION FROM reviews WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)?;
        Ok(RatingSummary { count, average })
    }
}
