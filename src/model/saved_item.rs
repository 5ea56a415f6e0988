use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reusable catalogue line a provider can drop into new quotes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
