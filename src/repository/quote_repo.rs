use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::model::payment::Payment;
use crate::model::quote::{Quote, QuoteItem, QuoteStatus, QuoteStatusTotal, QuoteWithItems};
use crate::repository::database::offset;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::util::db_retry::{with_db_retry, RetryPolicy};

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    /// Inserts the quote and its items atomically.
    async fn insert(&self, quote: Quote, items: Vec<QuoteItem>) -> RepositoryResult<QuoteWithItems>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<Quote>>;
    async fn find_by_public_token(&self, token: Uuid) -> RepositoryResult<Option<Quote>>;
    async fn items(&self, quote_id: Uuid) -> RepositoryResult<Vec<QuoteItem>>;
    /// Rewrites the editable fields and replaces the item list.
    async fn replace(&self, quote: &Quote, items: Vec<QuoteItem>) -> RepositoryResult<QuoteWithItems>;
    /// Persists the status fields of `quote` only while the stored status is still `from`.
    /// `None` means another request moved the quote first.
    async fn transition(&self, quote: &Quote, from: QuoteStatus) -> RepositoryResult<Option<Quote>>;
    /// Sets `viewed_at` once. `None` when the quote had already been viewed.
    async fn mark_viewed(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<Option<Quote>>;
    /// Moves an approved quote to paid and stores its payment in one transaction.
    async fn record_payment(&self, quote: &Quote, payment: &Payment) -> RepositoryResult<Option<Quote>>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()>;
    async fn list(&self, user_id: Uuid, filter: &QuoteFilter, page: u32, limit: u32) -> RepositoryResult<Vec<Quote>>;
    async fn count(&self, user_id: Uuid, filter: &QuoteFilter) -> RepositoryResult<i64>;
    async fn next_number(&self, user_id: Uuid) -> RepositoryResult<i32>;
    async fn status_totals(&self, user_id: Uuid) -> RepositoryResult<Vec<QuoteStatusTotal>>;
    async fn count_all(&self) -> RepositoryResult<i64>;
}

#[derive(Debug, Clone, Default)]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub client_id: Option<Uuid>,
}

pub struct PgQuoteRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgQuoteRepository {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        PgQuoteRepository { pool, retry }
    }

    async fn insert_items(
        tx: &mut Transaction<'_, Postgres>,
        items: &[QuoteItem],
    ) -> Result<Vec<QuoteItem>, sqlx::Error> {
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, QuoteItem>(
                r#"INSERT INTO quote_items (id, quote_id, description, quantity, unit_price_cents, total_cents, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *"#,
            )
            .bind(item.id)
            .bind(item.quote_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.total_cents)
            .bind(item.position)
            .fetch_one(&mut **tx)
            .await?;
            stored.push(row);
        }
        Ok(stored)
    }

    async fn insert_tx(&self, quote: &Quote, items: &[QuoteItem]) -> Result<QuoteWithItems, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let stored = sqlx::query_as::<_, Quote>(
            r#"INSERT INTO quotes (
                id, user_id, client_id, number, title, description, status, subtotal_cents,
                discount_cents, total_cents, valid_until, notes, payment_terms, public_token,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *"#,
        )
        .bind(quote.id)
        .bind(quote.user_id)
        .bind(quote.client_id)
        .bind(quote.number)
        .bind(&quote.title)
        .bind(&quote.description)
        .bind(quote.status)
        .bind(quote.subtotal_cents)
        .bind(quote.discount_cents)
        .bind(quote.total_cents)
        .bind(quote.valid_until)
        .bind(&quote.notes)
        .bind(&quote.payment_terms)
        .bind(quote.public_token)
        .bind(quote.created_at)
        .bind(quote.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        let items = Self::insert_items(&mut tx, items).await?;
        tx.commit().await?;
        Ok(QuoteWithItems { quote: stored, items })
    }

    async fn replace_tx(&self, quote: &Quote, items: &[QuoteItem]) -> Result<Option<QuoteWithItems>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let stored = sqlx::query_as::<_, Quote>(
            r#"UPDATE quotes SET
                client_id = $3, title = $4, description = $5, subtotal_cents = $6,
                discount_cents = $7, total_cents = $8, valid_until = $9, notes = $10,
                payment_terms = $11, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *"#,
        )
        .bind(quote.id)
        .bind(quote.user_id)
        .bind(quote.client_id)
        .bind(&quote.title)
        .bind(&quote.description)
        .bind(quote.subtotal_cents)
        .bind(quote.discount_cents)
        .bind(quote.total_cents)
        .bind(quote.valid_until)
        .bind(&quote.notes)
        .bind(&quote.payment_terms)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(stored) = stored else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
            .bind(quote.id)
            .execute(&mut *tx)
            .await?;
        let items = Self::insert_items(&mut tx, items).await?;
        tx.commit().await?;
        Ok(Some(QuoteWithItems { quote: stored, items }))
    }

    async fn record_payment_tx(&self, quote: &Quote, payment: &Payment) -> Result<Option<Quote>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, Quote>(
            r#"UPDATE quotes SET status = 'paid', paid_at = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'approved'
            RETURNING *"#,
        )
        .bind(quote.id)
        .bind(payment.paid_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"INSERT INTO payments (id, quote_id, user_id, amount_cents, method, paid_at, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(payment.id)
        .bind(payment.quote_id)
        .bind(payment.user_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(payment.paid_at)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(updated))
    }
}

const LIST_FILTER: &str =
    "user_id = $1 AND ($2::quote_status IS NULL OR status = $2) AND ($3::UUID IS NULL OR client_id = $3)";

#[async_trait]
impl QuoteRepository for PgQuoteRepository {
    #[tracing::instrument(skip(self, quote, items), fields(user_id = %quote.user_id, number = quote.number))]
    async fn insert(&self, quote: Quote, items: Vec<QuoteItem>) -> RepositoryResult<QuoteWithItems> {
        info!(items = items.len(), "Creating new quote");
        let result = with_db_retry(&self.retry, "quotes.insert", || self.insert_tx(&quote, &items)).await;
        match result {
            Ok(created) => {
                info!(quote_id = %created.quote.id, "Quote created successfully");
                Ok(created)
            }
            Err(e) => {
                error!("Failed to create quote: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<Quote>> {
        with_db_retry(&self.retry, "quotes.find", || {
            sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self, token))]
    async fn find_by_public_token(&self, token: Uuid) -> RepositoryResult<Option<Quote>> {
        with_db_retry(&self.retry, "quotes.find_by_public_token", || {
            sqlx::query_as::<_, Quote>("SELECT * FROM quotes WHERE public_token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn items(&self, quote_id: Uuid) -> RepositoryResult<Vec<QuoteItem>> {
        with_db_retry(&self.retry, "quote_items.list", || {
            sqlx::query_as::<_, QuoteItem>("SELECT * FROM quote_items WHERE quote_id = $1 ORDER BY position ASC")
                .bind(quote_id)
                .fetch_all(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self, quote, items), fields(quote_id = %quote.id))]
    async fn replace(&self, quote: &Quote, items: Vec<QuoteItem>) -> RepositoryResult<QuoteWithItems> {
        let result = with_db_retry(&self.retry, "quotes.replace", || self.replace_tx(quote, &items)).await;
        match result {
            Ok(Some(updated)) => {
                info!("Quote updated successfully");
                Ok(updated)
            }
            Ok(None) => Err(RepositoryError::not_found(format!("Quote {} not found", quote.id))),
            Err(e) => {
                error!("Failed to update quote: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self, quote), fields(quote_id = %quote.id, to = %quote.status))]
    async fn transition(&self, quote: &Quote, from: QuoteStatus) -> RepositoryResult<Option<Quote>> {
        let result = with_db_retry(&self.retry, "quotes.transition", || {
            sqlx::query_as::<_, Quote>(
                r#"UPDATE quotes SET
                    status = $3, sent_at = $4, approved_at = $5, rejected_at = $6,
                    rejection_reason = $7, paid_at = $8, updated_at = NOW()
                WHERE id = $1 AND status = $2
                RETURNING *"#,
            )
            .bind(quote.id)
            .bind(from)
            .bind(quote.status)
            .bind(quote.sent_at)
            .bind(quote.approved_at)
            .bind(quote.rejected_at)
            .bind(&quote.rejection_reason)
            .bind(quote.paid_at)
            .fetch_optional(&self.pool)
        })
        .await;

        match result {
            Ok(Some(updated)) => {
                info!("Quote moved from {} to {}", from, updated.status);
                Ok(Some(updated))
            }
            Ok(None) => {
                warn!("Quote is no longer {}", from);
                Ok(None)
            }
            Err(e) => {
                error!("Failed to update quote status: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn mark_viewed(&self, id: Uuid, at: DateTime<Utc>) -> RepositoryResult<Option<Quote>> {
        with_db_retry(&self.retry, "quotes.mark_viewed", || {
            sqlx::query_as::<_, Quote>(
                "UPDATE quotes SET viewed_at = $2 WHERE id = $1 AND viewed_at IS NULL RETURNING *",
            )
            .bind(id)
            .bind(at)
            .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self, quote, payment), fields(quote_id = %quote.id, method = ?payment.method))]
    async fn record_payment(&self, quote: &Quote, payment: &Payment) -> RepositoryResult<Option<Quote>> {
        let result =
            with_db_retry(&self.retry, "quotes.record_payment", || self.record_payment_tx(quote, payment)).await;
        match result {
            Ok(paid) => {
                if paid.is_some() {
                    info!(amount_cents = payment.amount_cents, "Payment recorded");
                }
                Ok(paid)
            }
            Err(e) => {
                error!("Failed to record payment: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let result = with_db_retry(&self.retry, "quotes.delete", || {
            sqlx::query("DELETE FROM quotes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
        })
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                info!("Quote deleted successfully");
                Ok(())
            }
            Ok(_) => Err(RepositoryError::not_found(format!("Quote {} not found", id))),
            Err(e) => {
                error!("Failed to delete quote: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, user_id: Uuid, filter: &QuoteFilter, page: u32, limit: u32) -> RepositoryResult<Vec<Quote>> {
        let sql = format!(
            "SELECT * FROM quotes WHERE {} ORDER BY created_at DESC LIMIT $4 OFFSET $5",
            LIST_FILTER
        );
        let result = with_db_retry(&self.retry, "quotes.list", || {
            sqlx::query_as::<_, Quote>(&sql)
                .bind(user_id)
                .bind(filter.status)
                .bind(filter.client_id)
                .bind(limit as i64)
                .bind(offset(page, limit))
                .fetch_all(&self.pool)
        })
        .await;

        match result {
            Ok(quotes) => {
                info!("Fetched {} quotes", quotes.len());
                Ok(quotes)
            }
            Err(e) => {
                error!("Failed to list quotes: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn count(&self, user_id: Uuid, filter: &QuoteFilter) -> RepositoryResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM quotes WHERE {}", LIST_FILTER);
        with_db_retry(&self.retry, "quotes.count", || {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(user_id)
                .bind(filter.status)
                .bind(filter.client_id)
                .fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn next_number(&self, user_id: Uuid) -> RepositoryResult<i32> {
        with_db_retry(&self.retry, "quotes.next_number", || {
            sqlx::query_scalar::<_, i32>("SELECT COALESCE(MAX(number), 0) + 1 FROM quotes WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn status_totals(&self, user_id: Uuid) -> RepositoryResult<Vec<QuoteStatusTotal>> {
        with_db_retry(&self.retry, "quotes.status_totals", || {
            sqlx::query_as::<_, QuoteStatusTotal>(
                r#"SELECT status, COUNT(*) AS count, COALESCE(SUM(total_cents), 0)::BIGINT AS total_cents
                FROM quotes WHERE user_id = $1 GROUP BY status"#,
            )
            .bind(user_id)
            .fetch_all(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn count_all(&self) -> RepositoryResult<i64> {
        with_db_retry(&self.retry, "quotes.count_all", || {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quotes").fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }
}
