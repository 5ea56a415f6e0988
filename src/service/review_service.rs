use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::dto::common::{non_blank, PaginationQuery};
use crate::dto::review_dto::{RespondReviewRequest, ReviewListResponse, SubmitReviewRequest};
use crate::model::notification::NotificationKind;
use crate::model::quote::QuoteStatus;
use crate::model::review::{RatingSummary, Review};
use crate::repository::quote_repo::QuoteRepository;
use crate::repository::repository_error::RepositoryError;
use crate::repository::review_repo::ReviewRepository;
use crate::service::notification_service::NotificationService;
use crate::util::error::ServiceError;

#[async_trait]
pub trait ReviewService: Send + Sync {
    async fn submit_public_review(&self, token: Uuid, request: SubmitReviewRequest) -> Result<Review, ServiceError>;
    async fn list_reviews(&self, user_id: Uuid, paging: PaginationQuery) -> Result<ReviewListResponse, ServiceError>;
    async fn respond(&self, user_id: Uuid, id: Uuid, request: RespondReviewRequest) -> Result<Review, ServiceError>;
    async fn rating_summary(&self, user_id: Uuid) -> Result<RatingSummary, ServiceError>;
}

pub struct ReviewServiceImpl {
    pub review_repo: Arc<dyn ReviewRepository>,
    pub quote_repo: Arc<dyn QuoteRepository>,
    pub notifications: Arc<dyn NotificationService>,
}

impl ReviewServiceImpl {
    pub fn new(
        review_repo: Arc<dyn ReviewRepository>,
        quote_repo: Arc<dyn QuoteRepository>,
        notifications: Arc<dyn NotificationService>,
    ) -> Self {
        Self { review_repo, quote_repo, notifications }
    }
}

#[async_trait]
impl ReviewService for ReviewServiceImpl {
    #[instrument(skip(self, token, request), fields(rating = request.rating))]
    async fn submit_public_review(&self, token: Uuid, request: SubmitReviewRequest) -> Result<Review, ServiceError> {
        if !(1..=5).contains(&request.rating) {
            return Err(ServiceError::InvalidInput("Rating must be between 1 and 5".to_string()));
        }
        let quote = match self.quote_repo.find_by_public_token(token).await? {
            Some(q) if q.status != QuoteStatus::Draft => q,
            _ => return Err(ServiceError::NotFound("Quote not found".to_string())),
        };
        if !matches!(quote.status, QuoteStatus::Approved | QuoteStatus::Paid) {
            return Err(ServiceError::Conflict("Only approved or paid quotes can be reviewed".to_string()));
        }
        if self.review_repo.find_by_quote(quote.id).await?.is_some() {
            return Err(ServiceError::Conflict("This quote has already been reviewed".to_string()));
        }

        let review = Review {
            id: Uuid::new_v4(),
            user_id: quote.user_id,
            client_id: quote.client_id,
            quote_id: quote.id,
            rating: request.rating,
            comment: non_blank(request.comment),
            response: None,
            responded_at: None,
            created_at: Utc::now(),
        };
        let review = self.review_repo.insert(review).await.map_err(|e| match e {
            RepositoryError::AlreadyExists(_) => ServiceError::Conflict("This quote has already been reviewed".to_string()),
            other => ServiceError::from(other),
        })?;
        info!(review_id = %review.id, "Review submitted");

        self.notifications
            .notify(
                quote.user_id,
                NotificationKind::ReviewReceived,
                "Nova avaliação".to_string(),
                format!("Você recebeu uma avaliação de {} estrela(s) no orçamento {}.", review.rating, quote.number_label()),
                Some(quote.id),
            )
            .await;
        Ok(review)
    }

    #[instrument(skip(self))]
    async fn list_reviews(&self, user_id: Uuid, paging: PaginationQuery) -> Result<ReviewListResponse, ServiceError> {
        let (page, limit) = (paging.page(), paging.limit());
        let items = self.review_repo.list_by_user(user_id, page, limit).await?;
        let total = self.review_repo.count_by_user(user_id).await?;
        let summary = self.review_repo.summary(user_id).await?;
        Ok(ReviewListResponse { items, total, page, limit, summary })
    }

    #[instrument(skip(self, request))]
    async fn respond(&self, user_id: Uuid, id: Uuid, request: RespondReviewRequest) -> Result<Review, ServiceError> {
        let response = non_blank(Some(request.response))
            .ok_or_else(|| ServiceError::InvalidInput("Response cannot be empty".to_string()))?;
        match self.review_repo.respond(user_id, id, &response, Utc::now()).await? {
            Some(review) => {
                info!("Review answered");
                Ok(review)
            }
            None => {
                warn!("Review not found for response");
                Err(ServiceError::NotFound("Review not found".to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn rating_summary(&self, user_id: Uuid) -> Result<RatingSummary, ServiceError> {
        Ok(self.review_repo.summary(user_id).await?)
    }
}
