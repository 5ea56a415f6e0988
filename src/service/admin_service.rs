use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::dto::admin_dto::{AdminUserQuery, GrantBonusRequest, PlanCount, PlatformStats, SetAdminRequest, SetPlanRequest};
use crate::dto::common::{non_blank, PaginatedResponse, PaginationQuery};
use crate::model::user::{Plan, PublicUser};
use crate::repository::quote_repo::QuoteRepository;
use crate::repository::user_repo::UserRepository;
use crate::service::plan_service;
use crate::service::user_service::load_user;
use crate::util::error::ServiceError;

#[async_trait]
pub trait AdminService: Send + Sync {
    async fn list_users(&self, query: AdminUserQuery) -> Result<PaginatedResponse<PublicUser>, ServiceError>;
    async fn get_user(&self, id: Uuid) -> Result<PublicUser, ServiceError>;
    async fn set_plan(&self, id: Uuid, request: SetPlanRequest) -> Result<PublicUser, ServiceError>;
    async fn set_admin(&self, acting_admin: Uuid, id: Uuid, request: SetAdminRequest) -> Result<PublicUser, ServiceError>;
    async fn grant_bonus_quotes(&self, id: Uuid, request: GrantBonusRequest) -> Result<PublicUser, ServiceError>;
    async fn platform_stats(&self) -> Result<PlatformStats, ServiceError>;
}

pub struct AdminServiceImpl {
    pub user_repo: Arc<dyn UserRepository>,
    pub quote_repo: Arc<dyn QuoteRepository>,
}

impl AdminServiceImpl {
    pub fn new(user_repo: Arc<dyn UserRepository>, quote_repo: Arc<dyn QuoteRepository>) -> Self {
        Self { user_repo, quote_repo }
    }
}

#[async_trait]
impl AdminService for AdminServiceImpl {
    #[instrument(skip(self))]
    async fn list_users(&self, query: AdminUserQuery) -> Result<PaginatedResponse<PublicUser>, ServiceError> {
        let paging = PaginationQuery { page: query.page, limit: query.limit };
        let (page, limit) = (paging.page(), paging.limit());
        let search = non_blank(query.search);

        let users = self.user_repo.list(search.as_deref(), page, limit).await?;
        let total = self.user_repo.count(search.as_deref()).await?;
        let items = users.into_iter().map(PublicUser::from).collect();
        Ok(PaginatedResponse::new(items, total, page, limit))
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: Uuid) -> Result<PublicUser, ServiceError> {
        let user = load_user(self.user_repo.as_ref(), id, Utc::now()).await?;
        Ok(PublicUser::from(user))
    }

    #[instrument(skip(self, request), fields(plan = %request.plan))]
    async fn set_plan(&self, id: Uuid, request: SetPlanRequest) -> Result<PublicUser, ServiceError> {
        let now = Utc::now();
        let mut user = load_user(self.user_repo.as_ref(), id, now).await?;

        let expires_at = match (request.expires_at, request.duration_days) {
            (Some(at), _) => Some(at),
            (None, Some(days)) => Some(now + Duration::days(days)),
            (None, None) => None,
        };
        if request.plan.is_premium() && expires_at.is_some_and(|at| at <= now) {
            return Err(ServiceError::InvalidInput("Premium expiry must be in the future".to_string()));
        }

        plan_service::grant_plan(&mut user, request.plan, expires_at);
        let user = self.user_repo.set_plan(user.id, user.plan, user.premium_expires_at).await?;
        info!(expires_at = ?user.premium_expires_at, "Plan changed by admin");
        Ok(PublicUser::from(user))
    }

    #[instrument(skip(self, request), fields(is_admin = request.is_admin))]
    async fn set_admin(&self, acting_admin: Uuid, id: Uuid, request: SetAdminRequest) -> Result<PublicUser, ServiceError> {
        if acting_admin == id && !request.is_admin {
            warn!("Admin tried to remove their own admin flag");
            return Err(ServiceError::Forbidden("You cannot remove your own admin access".to_string()));
        }
        let user = self.user_repo.set_admin(id, request.is_admin).await?;
        info!("Admin flag updated");
        Ok(PublicUser::from(user))
    }

    #[instrument(skip(self, request), fields(amount = request.amount))]
    async fn grant_bonus_quotes(&self, id: Uuid, request: GrantBonusRequest) -> Result<PublicUser, ServiceError> {
        if request.amount <= 0 {
            return Err(ServiceError::InvalidInput("Bonus quotes must be greater than zero".to_string()));
        }
        load_user(self.user_repo.as_ref(), id, Utc::now()).await?;
        let user = self.user_repo.add_bonus_quotes(id, request.amount).await?;
        info!(bonus_quotes = user.bonus_quotes, "Bonus quotes granted");
        Ok(PublicUser::from(user))
    }

    #[instrument(skip(self))]
    async fn platform_stats(&self) -> Result<PlatformStats, ServiceError> {
        let by_plan = self.user_repo.count_by_plan().await?;
        let users_by_plan: Vec<PlanCount> = [Plan::Free, Plan::Premium, Plan::PremiumCortesia]
            .into_iter()
            .map(|plan| PlanCount {
                plan,
                count: by_plan.iter().find(|(p, _)| *p == plan).map(|(_, c)| *c).unwrap_or(0),
            })
            .collect();
        let total_users = users_by_plan.iter().map(|p| p.count).sum();
        let premium_users = users_by_plan.iter().filter(|p| p.plan.is_premium()).map(|p| p.count).sum();
        let total_quotes = self.quote_repo.count_all().await?;

        Ok(PlatformStats { total_users, premium_users, users_by_plan, total_quotes })
    }
}
