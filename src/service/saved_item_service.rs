use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::dto::common::non_blank;
use crate::dto::saved_item_dto::{SavedItemQuery, SavedItemRequest};
use crate::model::saved_item::SavedItem;
use crate::repository::saved_item_repo::SavedItemRepository;
use crate::util::error::ServiceError;

#[async_trait]
pub trait SavedItemService: Send + Sync {
    async fn create_item(&self, user_id: Uuid, request: SavedItemRequest) -> Result<SavedItem, ServiceError>;
    async fn update_item(&self, user_id: Uuid, id: Uuid, request: SavedItemRequest) -> Result<SavedItem, ServiceError>;
    async fn delete_item(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError>;
    async fn list_items(&self, user_id: Uuid, query: SavedItemQuery) -> Result<Vec<SavedItem>, ServiceError>;
}

pub struct SavedItemServiceImpl {
    pub repo: Arc<dyn SavedItemRepository>,
}

impl SavedItemServiceImpl {
    pub fn new(repo: Arc<dyn SavedItemRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl SavedItemService for SavedItemServiceImpl {
    #[instrument(skip(self, request))]
    async fn create_item(&self, user_id: Uuid, request: SavedItemRequest) -> Result<SavedItem, ServiceError> {
        let now = Utc::now();
        let item = self
            .repo
            .insert(SavedItem {
                id: Uuid::new_v4(),
                user_id,
                description: request.description.trim().to_string(),
                unit_price_cents: request.unit_price_cents,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(item_id = %item.id, "Saved item created");
        Ok(item)
    }

    #[instrument(skip(self, request))]
    async fn update_item(&self, user_id: Uuid, id: Uuid, request: SavedItemRequest) -> Result<SavedItem, ServiceError> {
        let mut item = self
            .repo
            .find(user_id, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Saved item not found".to_string()))?;
        item.description = request.description.trim().to_string();
        item.unit_price_cents = request.unit_price_cents;
        Ok(self.repo.update(&item).await?)
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        self.repo.delete(user_id, id).await?;
        info!("Saved item deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_items(&self, user_id: Uuid, query: SavedItemQuery) -> Result<Vec<SavedItem>, ServiceError> {
        let search = non_blank(query.search);
        Ok(self.repo.list(user_id, search.as_deref()).await?)
    }
}
