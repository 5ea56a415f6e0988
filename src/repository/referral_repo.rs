use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::model::referral::{Referral, RewardType};
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::util::db_retry::{with_db_retry, RetryPolicy};

#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Stores the referral and credits the referrer in one transaction:
    /// `referral_count + 1`, plus either `reward_value` bonus quotes or
    /// `reward_value` days on a dated premium expiry. Fails with
    /// `AlreadyExists` when the referred user already has a referral.
    async fn record_with_reward(&self, referral: Referral) -> RepositoryResult<Referral>;
    async fn find_by_referred(&self, referred_id: Uuid) -> RepositoryResult<Option<Referral>>;
    async fn list_by_referrer(&self, referrer_id: Uuid) -> RepositoryResult<Vec<Referral>>;
}

pub struct PgReferralRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgReferralRepository {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        PgReferralRepository { pool, retry }
    }

    async fn record_tx(&self, referral: &Referral) -> Result<Referral, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, Referral>(
            r#"INSERT INTO referrals (id, referrer_id, referred_id, reward_type, reward_value, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *"#,
        )
        .bind(referral.id)
        .bind(referral.referrer_id)
        .bind(referral.referred_id)
        .bind(referral.reward_type)
        .bind(referral.reward_value)
        .bind(referral.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let (bonus_quotes, premium_days) = match referral.reward_type {
            RewardType::BonusQuotes => (referral.reward_value, 0),
            RewardType::PremiumDays => (0, referral.reward_value),
        };
        // Open-ended premium plans have no expiry to extend.
        sqlx::query(
            r#"UPDATE users SET
                referral_count = referral_count + 1,
                bonus_quotes = bonus_quotes + $2,
                premium_expires_at = CASE
                    WHEN $3 > 0 AND premium_expires_at IS NOT NULL
                        THEN GREATEST(premium_expires_at, $4) + make_interval(days => $3)
                    ELSE premium_expires_at
                END,
                updated_at = NOW()
            WHERE id = $1"#,
        )
        .bind(referral.referrer_id)
        .bind(bonus_quotes)
        .bind(premium_days)
        .bind(referral.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }
}

#[async_trait]
impl ReferralRepository for PgReferralRepository {
    #[tracing::instrument(skip(self, referral), fields(referrer_id = %referral.referrer_id, referred_id = %referral.referred_id))]
    async fn record_with_reward(&self, referral: Referral) -> RepositoryResult<Referral> {
        let referral = &referral;
        let result = with_db_retry(&self.retry, "referrals.record_with_reward", || self.record_tx(referral)).await;

        match result {
            Ok(created) => {
                info!("Referral recorded");
                Ok(created)
            }
            Err(e) => {
                error!("Failed to record referral: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_referred(&self, referred_id: Uuid) -> RepositoryResult<Option<Referral>> {
        with_db_retry(&self.retry, "referrals.find_by_referred", || {
            sqlx::query_as::<_, Referral>("SELECT * FROM referrals WHERE referred_id = $1")
                .bind(referred_id)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn list_by_referrer(&self, referrer_id: Uuid) -> RepositoryResult<Vec<Referral>> {
        with_db_retry(&self.retry, "referrals.list_by_referrer", || {
            sqlx::query_as::<_, Referral>("SELECT * FROM referrals WHERE referrer_id = $1 ORDER BY created_at DESC")
                .bind(referrer_id)
                .fetch_all(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }
}
