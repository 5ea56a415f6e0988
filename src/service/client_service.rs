use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::dto::client_dto::{ClientListQuery, ClientRequest};
use crate::dto::common::{non_blank, PaginatedResponse, PaginationQuery};
use crate::model::client::Client;
use crate::repository::client_repo::ClientRepository;
use crate::util::error::ServiceError;

#[async_trait]
pub trait ClientService: Send + Sync {
    async fn create_client(&self, user_id: Uuid, request: ClientRequest) -> Result<Client, ServiceError>;
    async fn get_client(&self, user_id: Uuid, id: Uuid) -> Result<Client, ServiceError>;
    async fn update_client(&self, user_id: Uuid, id: Uuid, request: ClientRequest) -> Result<Client, ServiceError>;
    async fn delete_client(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError>;
    async fn list_clients(&self, user_id: Uuid, query: ClientListQuery) -> Result<PaginatedResponse<Client>, ServiceError>;
}

pub struct ClientServiceImpl {
    pub client_repo: Arc<dyn ClientRepository>,
}

impl ClientServiceImpl {
    pub fn new(client_repo: Arc<dyn ClientRepository>) -> Self {
        Self { client_repo }
    }
}

fn apply_request(client: &mut Client, request: ClientRequest) {
    client.name = request.name.trim().to_string();
    client.email = non_blank(request.email).map(|e| e.to_lowercase());
    client.phone = non_blank(request.phone);
    client.document = non_blank(request.document);
    client.address = non_blank(request.address);
    client.city = non_blank(request.city);
    client.state = non_blank(request.state).map(|s| s.to_uppercase());
    client.zip_code = non_blank(request.zip_code);
    client.notes = non_blank(request.notes);
}

#[async_trait]
impl ClientService for ClientServiceImpl {
    #[instrument(skip(self, request))]
    async fn create_client(&self, user_id: Uuid, request: ClientRequest) -> Result<Client, ServiceError> {
        let now = Utc::now();
        let mut client = Client {
            id: Uuid::new_v4(),
            user_id,
            name: String::new(),
            email: None,
            phone: None,
            document: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        apply_request(&mut client, request);

        let res = self.client_repo.insert(client).await;
        match &res {
            Ok(c) => info!(client_id = %c.id, "Client created"),
            Err(e) => error!("Failed to create client: {e}"),
        }
        Ok(res?)
    }

    #[instrument(skip(self))]
    async fn get_client(&self, user_id: Uuid, id: Uuid) -> Result<Client, ServiceError> {
        self.client_repo
            .find(user_id, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Client not found".to_string()))
    }

    #[instrument(skip(self, request))]
    async fn update_client(&self, user_id: Uuid, id: Uuid, request: ClientRequest) -> Result<Client, ServiceError> {
        let mut client = self.get_client(user_id, id).await?;
        apply_request(&mut client, request);
        let res = self.client_repo.update(&client).await;
        match &res {
            Ok(_) => info!("Client updated"),
            Err(e) => error!("Failed to update client: {e}"),
        }
        Ok(res?)
    }

    #[instrument(skip(self))]
    async fn delete_client(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let client = self.get_client(user_id, id).await?;
        let quotes = self.client_repo.count_quotes(client.id).await?;
        if quotes > 0 {
            warn!(quotes, "Refusing to delete client with quotes");
            return Err(ServiceError::Conflict(format!(
                "Client has {} quote(s) and cannot be deleted",
                quotes
            )));
        }
        self.client_repo.delete(user_id, id).await?;
        info!("Client deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_clients(&self, user_id: Uuid, query: ClientListQuery) -> Result<PaginatedResponse<Client>, ServiceError> {
        let paging = PaginationQuery { page: query.page, limit: query.limit };
        let (page, limit) = (paging.page(), paging.limit());
        let search = non_blank(query.search);

        let items = self.client_repo.list(user_id, search.as_deref(), page, limit).await?;
        let total = self.client_repo.count(user_id, search.as_deref()).await?;
        Ok(PaginatedResponse::new(items, total, page, limit))
    }
}
