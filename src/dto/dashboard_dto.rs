use serde::{Deserialize, Serialize};

use crate::model::quote::QuoteStatus;
use crate::service::plan_service::PlanUsage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: QuoteStatus,
    pub count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub quotes_by_status: Vec<StatusCount>,
    pub total_quotes: i64,
    /// Approved and paid quotes.
    pub approved_value_cents: i64,
    pub received_value_cents: i64,
    /// Percentage in 0..=100 over quotes that left draft.
    pub conversion_rate: f64,
    pub client_count: i64,
    pub review_count: i64,
    pub average_rating: Option<f64>,
    pub plan: PlanUsage,
}
