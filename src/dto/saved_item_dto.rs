use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SavedItemRequest {
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    #[validate(range(min = 0i64, max = 100_000_000_000i64))]
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SavedItemQuery {
    pub search: Option<String>,
}
