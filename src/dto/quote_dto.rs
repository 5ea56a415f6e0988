use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::dto::document_dto::PartyBlock;
use crate::model::payment::PaymentMethod;
use crate::model::quote::{QuoteStatus, QuoteWithItems};
use crate::model::review::Review;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuoteItemRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(range(exclusive_min = 0.0, max = 1_000_000.0))]
    pub quantity: f64,
    #[validate(range(min = 0i64, max = 100_000_000_000i64))]
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuoteRequest {
    pub client_id: Uuid,
    #[validate(length(min = 2, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 200), nested)]
    pub items: Vec<QuoteItemRequest>,
    #[validate(range(min = 0))]
    pub discount_cents: Option<i64>,
    pub valid_until: Option<NaiveDate>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    #[validate(length(max = 2000))]
    pub payment_terms: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteListQuery {
    pub status: Option<String>,
    pub client_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: QuoteStatus,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub paid_at: Option<DateTime<Utc>>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// What the client sees behind the public link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuoteResponse {
    #[serde(flatten)]
    pub quote: QuoteWithItems,
    pub number_label: String,
    pub provider: PartyBlock,
    pub client: PartyBlock,
    pub expired: bool,
    /// Approve/reject buttons are offered only while this is true.
    pub can_respond: bool,
    pub review: Option<Review>,
}
