use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::payment::PaymentMethod;
use crate::model::quote::QuoteStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quote,
    Receipt,
}

/// Identification block for either side of the document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartyBlock {
    pub name: String,
    pub document: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLine {
    pub position: i32,
    pub description: String,
    pub quantity: f64,
    pub quantity_label: String,
    pub unit_price_cents: i64,
    pub unit_price: String,
    pub total_cents: i64,
    pub total: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentBlock {
    pub method: PaymentMethod,
    pub method_label: String,
    pub amount_cents: i64,
    pub amount: String,
    pub paid_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Everything a client needs to render the printable quote or receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteDocument {
    pub kind: DocumentKind,
    pub number_label: String,
    pub title: String,
    pub description: Option<String>,
    pub status: QuoteStatus,
    pub issue_date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub provider: PartyBlock,
    pub client: PartyBlock,
    pub lines: Vec<DocumentLine>,
    pub subtotal_cents: i64,
    pub subtotal: String,
    pub discount_cents: i64,
    pub discount: String,
    pub total_cents: i64,
    pub total: String,
    pub notes: Option<String>,
    pub payment_terms: Option<String>,
    pub payment: Option<PaymentBlock>,
    /// Present only when the provider has no premium features.
    pub watermark: Option<String>,
}
