use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::dto::dashboard_dto::{DashboardStats, StatusCount};
use crate::model::quote::{QuoteStatus, QuoteStatusTotal};
use crate::repository::client_repo::ClientRepository;
use crate::repository::quote_repo::QuoteRepository;
use crate::repository::review_repo::ReviewRepository;
use crate::repository::user_repo::UserRepository;
use crate::service::plan_service::{self, PlanPolicy};
use crate::service::user_service::load_user;
use crate::util::error::ServiceError;

#[async_trait]
pub trait DashboardService: Send + Sync {
    async fn stats(&self, user_id: Uuid) -> Result<DashboardStats, ServiceError>;
}

pub struct DashboardServiceImpl {
    pub quote_repo: Arc<dyn QuoteRepository>,
    pub client_repo: Arc<dyn ClientRepository>,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub policy: PlanPolicy,
}

impl DashboardServiceImpl {
    pub fn new(
        quote_repo: Arc<dyn QuoteRepository>,
        client_repo: Arc<dyn ClientRepository>,
        review_repo: Arc<dyn ReviewRepository>,
        user_repo: Arc<dyn UserRepository>,
        policy: PlanPolicy,
    ) -> Self {
        Self { quote_repo, client_repo, review_repo, user_repo, policy }
    }
}

/// Every status appears once, in lifecycle order, zero-filled.
pub fn status_counts(totals: &[QuoteStatusTotal]) -> Vec<StatusCount> {
    QuoteStatus::ALL
        .iter()
        .map(|status| {
            let found = totals.iter().find(|t| t.status == *status);
            StatusCount {
                status: *status,
                count: found.map(|t| t.count).unwrap_or(0),
                total_cents: found.map(|t| t.total_cents).unwrap_or(0),
            }
        })
        .collect()
}

/// (approved + paid) / (pending + approved + rejected + paid), as a percentage.
pub fn conversion_rate(counts: &[StatusCount]) -> f64 {
    let count_of = |s: QuoteStatus| counts.iter().find(|c| c.status == s).map(|c| c.count).unwrap_or(0);
    let won = count_of(QuoteStatus::Approved) + count_of(QuoteStatus::Paid);
    let decided = count_of(QuoteStatus::Pending) + count_of(QuoteStatus::Rejected) + won;
    if decided == 0 {
        0.0
    } else {
        (won as f64 / decided as f64 * 1000.0).round() / 10.0
    }
}

#[async_trait]
impl DashboardService for DashboardServiceImpl {
    #[instrument(skip(self))]
    async fn stats(&self, user_id: Uuid) -> Result<DashboardStats, ServiceError> {
        let now = Utc::now();
        let user = load_user(self.user_repo.as_ref(), user_id, now).await?;
        let totals = self.quote_repo.status_totals(user_id).await?;
        let counts = status_counts(&totals);

        let value_of = |s: QuoteStatus| counts.iter().find(|c| c.status == s).map(|c| c.total_cents).unwrap_or(0);
        let approved_value_cents = value_of(QuoteStatus::Approved) + value_of(QuoteStatus::Paid);
        let received_value_cents = value_of(QuoteStatus::Paid);
        let total_quotes = counts.iter().map(|c| c.count).sum();
        let conversion_rate = conversion_rate(&counts);

        let client_count = self.client_repo.count(user_id, None).await?;
        let rating = self.review_repo.summary(user_id).await?;

        Ok(DashboardStats {
            quotes_by_status: counts,
            total_quotes,
            approved_value_cents,
            received_value_cents,
            conversion_rate,
            client_count,
            review_count: rating.count,
            average_rating: rating.average,
            plan: plan_service::plan_usage(&user, &self.policy, now),
        })
    }
}
