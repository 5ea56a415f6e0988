use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::dto::notification_dto::{
    MarkAllReadResponse, NotificationListResponse, NotificationQuery, DEFAULT_NOTIFICATION_LIMIT,
};
use crate::dto::common::MAX_PAGE_SIZE;
use crate::model::notification::{Notification, NotificationKind};
use crate::repository::notification_repo::NotificationRepository;
use crate::util::error::ServiceError;

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Best effort: failures are logged and never reach the caller.
    async fn notify(&self, user_id: Uuid, kind: NotificationKind, title: String, message: String, quote_id: Option<Uuid>);
    async fn list(&self, user_id: Uuid, query: NotificationQuery) -> Result<NotificationListResponse, ServiceError>;
    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError>;
    async fn mark_all_read(&self, user_id: Uuid) -> Result<MarkAllReadResponse, ServiceError>;
}

pub struct NotificationServiceImpl {
    pub repo: Arc<dyn NotificationRepository>,
}

impl NotificationServiceImpl {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl NotificationService for NotificationServiceImpl {
    #[instrument(skip(self, title, message))]
    async fn notify(&self, user_id: Uuid, kind: NotificationKind, title: String, message: String, quote_id: Option<Uuid>) {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title,
            message,
            quote_id,
            read_at: None,
            created_at: Utc::now(),
        };
        match self.repo.insert(notification).await {
            Ok(_) => info!("Notification created"),
            Err(e) => warn!("Could not create notification: {e}"),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, user_id: Uuid, query: NotificationQuery) -> Result<NotificationListResponse, ServiceError> {
        let limit = query.limit.unwrap_or(DEFAULT_NOTIFICATION_LIMIT).clamp(1, MAX_PAGE_SIZE);
        let items = self.repo.list(user_id, query.unread_only, limit).await;
        if let Err(e) = &items {
            error!("Failed to list notifications: {e}");
        }
        let items = items?;
        let unread_count = self.repo.count_unread(user_id).await?;
        Ok(NotificationListResponse { items, unread_count })
    }

    #[instrument(skip(self))]
    async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        if self.repo.mark_read(user_id, id, Utc::now()).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound("Notification not found".to_string()))
        }
    }

    #[instrument(skip(self))]
    async fn mark_all_read(&self, user_id: Uuid) -> Result<MarkAllReadResponse, ServiceError> {
        let updated = self.repo.mark_all_read(user_id, Utc::now()).await?;
        info!(updated, "Notifications marked as read");
        Ok(MarkAllReadResponse { updated })
    }
}
