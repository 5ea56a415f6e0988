use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, Default)]
#[sqlx(type_name = "quote_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 5] = [
        QuoteStatus::Draft,
        QuoteStatus::Pending,
        QuoteStatus::Approved,
        QuoteStatus::Rejected,
        QuoteStatus::Paid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Pending => "pending",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Paid => "paid",
        }
    }

    /// Lifecycle: draft -> pending -> approved | rejected, approved -> paid.
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self, next),
            (QuoteStatus::Draft, QuoteStatus::Pending)
                | (QuoteStatus::Pending, QuoteStatus::Approved)
                | (QuoteStatus::Pending, QuoteStatus::Rejected)
                | (QuoteStatus::Approved, QuoteStatus::Paid)
        )
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, QuoteStatus::Draft | QuoteStatus::Pending)
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuoteStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown quote status: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub number: i32,
    pub title: String,
    pub description: Option<String>,
    pub status: QuoteStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub payment_terms: Option<String>,
    pub public_token: Uuid,
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn number_label(&self) -> String {
        format!("#{:04}", self.number)
    }

    /// A quote with a validity date in the past can no longer be answered.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.valid_until.map(|d| d < today).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuoteItem {
    pub id: Uuid,
    pub quote_id: Uuid,
    pub description: String,
    pub quantity: f64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub position: i32,
}

impl QuoteItem {
    /// `None` when the product does not fit in cents.
    pub fn line_total(quantity: f64, unit_price_cents: i64) -> Option<i64> {
        let total = (quantity * unit_price_cents as f64).round();
        (total.is_finite() && total >= 0.0 && total < i64::MAX as f64).then_some(total as i64)
    }
}

/// Quote together with its ordered line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteWithItems {
    #[serde(flatten)]
    pub quote: Quote,
    pub items: Vec<QuoteItem>,
}

/// Per-status aggregate used by the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
pub struct QuoteStatusTotal {
    pub status: QuoteStatus,
    pub count: i64,
    pub total_cents: i64,
}
