use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::model::payment::Payment;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::util::db_retry::{with_db_retry, RetryPolicy};

/// Payments are written together with the quote status by `QuoteRepository::record_payment`.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_quote(&self, quote_id: Uuid) -> RepositoryResult<Option<Payment>>;
}

pub struct PgPaymentRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        PgPaymentRepository { pool, retry }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    #[tracing::instrument(skip(self))]
    async fn find_by_quote(&self, quote_id: Uuid) -> RepositoryResult<Option<Payment>> {
        with_db_retry(&self.retry, "payments.find_by_quote", || {
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE quote_id = $1")
                .bind(quote_id)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }
}
