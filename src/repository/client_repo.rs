use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::model::client::Client;
use crate::repository::database::offset;
use crate::repository::repository_error::{RepositoryError, RepositoryResult};
use crate::util::db_retry::{with_db_retry, RetryPolicy};

/// Every lookup is scoped by the owning user.
#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn insert(&self, client: Client) -> RepositoryResult<Client>;
    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<Client>>;
    async fn update(&self, client: &Client) -> RepositoryResult<Client>;
    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()>;
    async fn list(&self, user_id: Uuid, search: Option<&str>, page: u32, limit: u32) -> RepositoryResult<Vec<Client>>;
    async fn count(&self, user_id: Uuid, search: Option<&str>) -> RepositoryResult<i64>;
    async fn count_quotes(&self, client_id: Uuid) -> RepositoryResult<i64>;
}

pub struct PgClientRepository {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgClientRepository {
    pub fn new(pool: PgPool, retry: RetryPolicy) -> Self {
        PgClientRepository { pool, retry }
    }
}

const SEARCH_FILTER: &str =
    "user_id = $1 AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%')";

#[async_trait]
impl ClientRepository for PgClientRepository {
    #[tracing::instrument(skip(self, client), fields(user_id = %client.user_id))]
    async fn insert(&self, client: Client) -> RepositoryResult<Client> {
        let client = &client;
        let result = with_db_retry(&self.retry, "clients.insert", || {
            sqlx::query_as::<_, Client>(
                r#"INSERT INTO clients (
                    id, user_id, name, email, phone, document, address, city, state, zip_code,
                    notes, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                RETURNING *"#,
            )
            .bind(client.id)
            .bind(client.user_id)
            .bind(&client.name)
            .bind(&client.email)
            .bind(&client.phone)
            .bind(&client.document)
            .bind(&client.address)
            .bind(&client.city)
            .bind(&client.state)
            .bind(&client.zip_code)
            .bind(&client.notes)
            .bind(client.created_at)
            .bind(client.updated_at)
            .fetch_one(&self.pool)
        })
        .await;

        match result {
            Ok(created) => {
                info!(client_id = %created.id, "Client created successfully");
                Ok(created)
            }
            Err(e) => {
                error!("Failed to create client: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<Option<Client>> {
        with_db_retry(&self.retry, "clients.find", || {
            sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self, client), fields(client_id = %client.id))]
    async fn update(&self, client: &Client) -> RepositoryResult<Client> {
        let result = with_db_retry(&self.retry, "clients.update", || {
            sqlx::query_as::<_, Client>(
                r#"UPDATE clients SET
                    name = $3, email = $4, phone = $5, document = $6, address = $7, city = $8,
                    state = $9, zip_code = $10, notes = $11, updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                RETURNING *"#,
            )
            .bind(client.id)
            .bind(client.user_id)
            .bind(&client.name)
            .bind(&client.email)
            .bind(&client.phone)
            .bind(&client.document)
            .bind(&client.address)
            .bind(&client.city)
            .bind(&client.state)
            .bind(&client.zip_code)
            .bind(&client.notes)
            .fetch_optional(&self.pool)
        })
        .await;

        match result {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => Err(RepositoryError::not_found(format!("Client {} not found", client.id))),
            Err(e) => {
                error!("Failed to update client: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, user_id: Uuid, id: Uuid) -> RepositoryResult<()> {
        let result = with_db_retry(&self.retry, "clients.delete", || {
            sqlx::query("DELETE FROM clients WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
        })
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                info!("Client deleted successfully");
                Ok(())
            }
            Ok(_) => Err(RepositoryError::not_found(format!("Client {} not found", id))),
            Err(e) => {
                error!("Failed to delete client: {}", e);
                Err(RepositoryError::from(e))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, user_id: Uuid, search: Option<&str>, page: u32, limit: u32) -> RepositoryResult<Vec<Client>> {
        let sql = format!(
            "SELECT * FROM clients WHERE {} ORDER BY name ASC LIMIT $3 OFFSET $4",
            SEARCH_FILTER
        );
        with_db_retry(&self.retry, "clients.list", || {
            sqlx::query_as::<_, Client>(&sql)
                .bind(user_id)
                .bind(search)
                .bind(limit as i64)
                .bind(offset(page, limit))
                .fetch_all(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn count(&self, user_id: Uuid, search: Option<&str>) -> RepositoryResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM clients WHERE {}", SEARCH_FILTER);
        with_db_retry(&self.retry, "clients.count", || {
            sqlx::query_scalar::<_, i64>(&sql)
                .bind(user_id)
                .bind(search)
                .fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }

    #[tracing::instrument(skip(self))]
    async fn count_quotes(&self, client_id: Uuid) -> RepositoryResult<i64> {
        with_db_retry(&self.retry, "clients.count_quotes", || {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quotes WHERE client_id = $1")
                .bind(client_id)
                .fetch_one(&self.pool)
        })
        .await
        .map_err(RepositoryError::from)
    }
}
