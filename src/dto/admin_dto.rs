use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::user::Plan;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `expires_at` wins over `duration_days` when both are sent.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetPlanRequest {
    pub plan: Plan,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 3650))]
    pub duration_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GrantBonusRequest {
    #[validate(range(min = 1, max = 1000))]
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCount {
    pub plan: Plan,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total_users: i64,
    pub premium_users: i64,
    pub users_by_plan: Vec<PlanCount>,
    pub total_quotes: i64,
}
