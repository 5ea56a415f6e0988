use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::review::{RatingSummary, Review};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RespondReviewRequest {
    #[validate(length(min = 1, max = 2000))]
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewListResponse {
    pub items: Vec<Review>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub summary: RatingSummary,
}
