use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::model::user::{month_start, Plan, User};
use crate::repository::database::offset;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::util::db_retry::{with_db_retry, RetryPolicy};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: User) -> RepositoryResult<User>;
    /// Writes the editable profile columns only; plan and quota counters are untouched.
    async fn update_profile(&self, user: &User) -> RepositoryResult<User>;
    /// `None` when the account is already linked to a different uid.
    async fn link_firebase_uid(&self, id: Uuid, uid: &str) -> RepositoryResult<Option<User>>;
    async fn set_plan(&self, id: Uuid, plan: Plan, expires_at: Option<DateTime<Utc>>) -> RepositoryResult<User>;
    /// Turns an expired premium row into FREE; `None` when the row was not expired.
    async fn downgrade_expired(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<Option<User>>;
    /// Resets the monthly counter; `None` when the row is already on `period_start`.
    async fn roll_quota_period(&self, id: Uuid, period_start: NaiveDate) -> RepositoryResult<Option<User>>;
    /// Charges one quote in a single conditional statement, rolling the period
    /// over when needed. `None` when a FREE user has neither monthly nor bonus
    /// slots left (or the user does not exist).
    async fn consume_quote_slot(&self, id: Uuid, monthly_limit: i32, now: DateTime<Utc>)
        -> RepositoryResult<Option<User>>;
    /// Gives back a slot charged for a quote that was never stored.
    async fn release_quote_slot(&self, id: Uuid, bonus: bool) -> RepositoryResult<()>;
    async fn add_bonus_quotes(&self, id: Uuid, amount: i32) -> RepositoryResult<User>;
    async fn set_admin(&self, id: Uuid, is_admin: bool) -> RepositoryResult<User>;
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_firebase_uid(&self, uid: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_referral_code(&self, code: &str) -> RepositoryResult<Option<User>>;
    /// Case-insensitive search over email and name.
    async fn list(&self, search: Option<&str>, page: u32, limit: u32) -> RepositoryResult<Vec<User>>;
    async fn count(&self, search: Option<&str>) -> RepositoryResult<i64>;
    async fn count_by_plan(&self) -> RepositoryResult<Vec<(Plan, i64)>>;
}

pub struct PgUserRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        PgUserRepository { pool, retry }
    }
}

fn updated_row(result: Result<Option<User>, sqlx::Error>, id: Uuid) -> RepositoryResult<User> {
    match result {
        Ok(Some(updated)) => {
            info!("User updated successfully");
            Ok(updated)
        }
        Ok(None) => {
            error!("No user found to update");
            Err(RepositoryError::not_found(format!("User {} not found", id)))
        }
        Err(e) => {
            error!("Failed to update user: {}", e);
            Err(RepositoryError::from(e))
        }
    }
}

const SEARCH_FILTER: &str =
    "($1::TEXT IS NULL OR email ILIKE '%' || $1 || '%' OR name ILIKE '%' || $1 || '%')";

#[async_trait]
impl UserRepository for PgUserRepository {
    #[tracing::instrument(skip(self, user), fields(email = %user.email))]
    async fn insert(&self, user: User) -> RepositoryResult<User> {
        info!("Creating new user");
        let user = &user;
        let result = with_db_retry(&self.retry, "users.insert", || {
            sqlx::query_as::<_, User>(
                r#"INSERT INTO users (
                    id, email, password_hash, firebase_uid, name, business_name, phone, document,
                    address, city, state, zip_code, plan, premium_expires_at, quotes_this_month,
                    quota_period_start, bonus_quotes, referral_code, referred_by, referral_count,
                    is_admin, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                          $16, $17, $18, $19, $20, $21, $22, $23)
                RETURNING *"#,
            )
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.firebase_uid)
            .bind(&user.name)
            .bind(&user.business_name)
            .bind(&user.phone)
            .bind(&user.document)
            .bind(&user.address)
            .bind(&user.city)
            .bind(&user.state)
            .bind(&user.zip_code)
            .bind(user.plan)
            .bind(user.premium_expires_at)
            .bind(user.quotes_this_month)
            .bind(user.quota_period_start)
            .bind(user.bonus_quotes)
            .bind(&user.referral_code)
            .bind(user.referred_by)
            .bind(user.referral_count)
            .bind(user.is_admin)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
        })
        .await;

        match result {
            Ok(created) => {
                info!(user_id = %created.id, "User created successfully");
                Ok(created)
            }
            Err(e) => {
                error!("Failed to create user: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn update_profile(&self, user: &User) -> RepositoryResult<User> {
        let result = with_db_retry(&self.retry, "users.update_profile", || {
            sqlx::query_as::<_, User>(
                r#"UPDATE users SET
                    name = $2, business_name = $3, phone = $4, document = $5, address = $6,
                    city = $7, state = $8, zip_code = $9, updated_at = NOW()
                WHERE id = $1
                RETURNING *"#,
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.business_name)
            .bind(&user.phone)
            .bind(&user.document)
            .bind(&user.address)
            .bind(&user.city)
            .bind(&user.state)
            .bind(&user.zip_code)
            .fetch_optional(&self.pool)
        })
        .await;
        updated_row(result, user.id)
    }

    #[tracing::instrument(skip(self))]
    async fn link_firebase_uid(&self, id: Uuid, uid: &str) -> RepositoryResult<Option<User>> {
        with_db_retry(&self.retry, "users.link_firebase_uid", || {
            sqlx::query_as::<_, User>(
                r#"UPDATE users SET firebase_uid = $2, updated_at = NOW()
                WHERE id = $1 AND (firebase_uid IS NULL OR firebase_uid = $2)
                RETURNING *"#,
            )
            .bind(id)
            .bind(uid)
            .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn set_plan(&self, id: Uuid, plan: Plan, expires_at: Option<DateTime<Utc>>) -> RepositoryResult<User> {
        let result = with_db_retry(&self.retry, "users.set_plan", || {
            sqlx::query_as::<_, User>(
                "UPDATE users SET plan = $2, premium_expires_at = $3, updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .bind(plan)
            .bind(expires_at)
            .fetch_optional(&self.pool)
        })
        .await;
        updated_row(result, id)
    }

    #[tracing::instrument(skip(self))]
    async fn downgrade_expired(&self, id: Uuid, now: DateTime<Utc>) -> RepositoryResult<Option<User>> {
        with_db_retry(&self.retry, "users.downgrade_expired", || {
            sqlx::query_as::<_, User>(
                r#"UPDATE users SET plan = 'FREE', premium_expires_at = NULL, updated_at = NOW()
                WHERE id = $1 AND plan <> 'FREE' AND premium_expires_at <= $2
                RETURNING *"#,
            )
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn roll_quota_period(&self, id: Uuid, period_start: NaiveDate) -> RepositoryResult<Option<User>> {
        with_db_retry(&self.retry, "users.roll_quota_period", || {
            sqlx::query_as::<_, User>(
                r#"UPDATE users SET quotes_this_month = 0, quota_period_start = $2, updated_at = NOW()
                WHERE id = $1 AND quota_period_start <> $2
                RETURNING *"#,
            )
            .bind(id)
            .bind(period_start)
            .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn consume_quote_slot(
        &self,
        id: Uuid,
        monthly_limit: i32,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<User>> {
        // $3 is the current period; a row still on an older one counts as zero used.
        let result = with_db_retry(&self.retry, "users.consume_quote_slot", || {
            sqlx::query_as::<_, User>(
                r#"UPDATE users SET
                    quotes_this_month = CASE WHEN quota_period_start = $3 THEN quotes_this_month + 1 ELSE 1 END,
                    quota_period_start = $3,
                    bonus_quotes = CASE
                        WHEN plan <> 'FREE' AND (premium_expires_at IS NULL OR premium_expires_at > $4)
                            THEN bonus_quotes
                        WHEN (CASE WHEN quota_period_start = $3 THEN quotes_this_month ELSE 0 END) < $2
                            THEN bonus_quotes
                        ELSE bonus_quotes - 1
                    END,
                    updated_at = NOW()
                WHERE id = $1 AND (
                    (plan <> 'FREE' AND (premium_expires_at IS NULL OR premium_expires_at > $4))
                    OR (CASE WHEN quota_period_start = $3 THEN quotes_this_month ELSE 0 END) < $2
                    OR bonus_quotes > 0
                )
                RETURNING *"#,
            )
            .bind(id)
            .bind(monthly_limit)
            .bind(month_start(now))
            .bind(now)
            .fetch_optional(&self.pool)
        })
        .await;

        match result {
            Ok(Some(user)) => {
                info!(used = user.quotes_this_month, bonus = user.bonus_quotes, "Quote slot consumed");
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to consume quote slot: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn release_quote_slot(&self, id: Uuid, bonus: bool) -> RepositoryResult<()> {
        with_db_retry(&self.retry, "users.release_quote_slot", || {
            sqlx::query(
                r#"UPDATE users SET
                    quotes_this_month = GREATEST(quotes_this_month - 1, 0),
                    bonus_quotes = bonus_quotes + CASE WHEN $2::BOOLEAN THEN 1 ELSE 0 END,
                    updated_at = NOW()
                WHERE id = $1"#,
            )
            .bind(id)
            .bind(bonus)
            .execute(&self.pool)
        })
        .await
        .map(|_| ())
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn add_bonus_quotes(&self, id: Uuid, amount: i32) -> RepositoryResult<User> {
        let result = with_db_retry(&self.retry, "users.add_bonus_quotes", || {
            sqlx::query_as::<_, User>(
                "UPDATE users SET bonus_quotes = bonus_quotes + $2, updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(id)
            .bind(amount)
            .fetch_optional(&self.pool)
        })
        .await;
        updated_row(result, id)
    }

    #[tracing::instrument(skip(self))]
    async fn set_admin(&self, id: Uuid, is_admin: bool) -> RepositoryResult<User> {
        let result = with_db_retry(&self.retry, "users.set_admin", || {
            sqlx::query_as::<_, User>("UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
                .bind(id)
                .bind(is_admin)
                .fetch_optional(&self.pool)
        })
        .await;
        updated_row(result, id)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        with_db_retry(&self.retry, "users.find_by_id", || {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        with_db_retry(&self.retry, "users.find_by_email", || {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
                .bind(email)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_firebase_uid(&self, uid: &str) -> RepositoryResult<Option<User>> {
        with_db_retry(&self.retry, "users.find_by_firebase_uid", || {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE firebase_uid = $1")
                .bind(uid)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_referral_code(&self, code: &str) -> RepositoryResult<Option<User>> {
        with_db_retry(&self.retry, "users.find_by_referral_code", || {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE referral_code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, search: Option<&str>, page: u32, limit: u32) -> RepositoryResult<Vec<User>> {
        let sql = format!(
            "SELECT * FROM users WHERE {} ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            SEARCH_FILTER
        );
        let result = with_db_retry(&self.retry, "users.list", || {
            sqlx::query_as::<_, User>(&sql)
                .bind(search)
                .bind(limit as i64)
                .bind(offset(page, limit))
                .fetch_all(&self.pool)
        })
        .await;

        match result {
            Ok(users) => {
                info!("Fetched {} users", users.len());
                Ok(users)
            }
            Err(e) => {
                error!("Failed to list users: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn count(&self, search: Option<&str>) -> RepositoryResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM users WHERE {}", SEARCH_FILTER);
        with_db_retry(&self.retry, "users.count", || {
            sqlx::query_scalar::<_, i64>(&sql).bind(search).fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn count_by_plan(&self) -> RepositoryResult<Vec<(Plan, i64)>> {
        with_db_retry(&self.retry, "users.count_by_plan", || {
            sqlx::query_as::<_, (Plan, i64)>("SELECT plan, COUNT(*) FROM users GROUP BY plan ORDER BY plan")
                .fetch_all(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }
}
