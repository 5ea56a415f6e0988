use sqlx::PgPool;
use std::sync::Arc;

use crate::middlewares::auth_middleware::AuthState;
use crate::repository::client_repo::{ClientRepository, PgClientRepository};
use crate::repository::notification_repo::{NotificationRepository, PgNotificationRepository};
use crate::repository::payment_repo::{PaymentRepository, PgPaymentRepository};
use crate::repository::quote_repo::{PgQuoteRepository, QuoteRepository};
use crate::repository::referral_repo::{PgReferralRepository, ReferralRepository};
use crate::repository::review_repo::{PgReviewRepository, ReviewRepository};
use crate::repository::saved_item_repo::{PgSavedItemRepository, SavedItemRepository};
use crate::repository::user_repo::{PgUserRepository, UserRepository};
use crate::service::admin_service::AdminServiceImpl;
use crate::service::client_service::ClientServiceImpl;
use crate::service::dashboard_service::DashboardServiceImpl;
use crate::service::notification_service::{NotificationService, NotificationServiceImpl};
use crate::service::plan_service::PlanPolicy;
use crate::service::quote_service::QuoteServiceImpl;
use crate::service::review_service::ReviewServiceImpl;
use crate::service::saved_item_service::SavedItemServiceImpl;
use crate::service::user_service::UserServiceImpl;
use crate::util::db_retry::RetryPolicy;
use crate::util::email::QuoteMailer;
use crate::util::firebase::IdTokenVerifier;
use crate::util::jwt::JwtTokenUtilsImpl;

#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub quotes: Arc<dyn QuoteRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub referrals: Arc<dyn ReferralRepository>,
    pub saved_items: Arc<dyn SavedItemRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub payments: Arc<dyn PaymentRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool, retry: RetryPolicy) -> Self {
        Repositories {
            users: Arc::new(PgUserRepository::new(pool.clone(), retry.clone())),
            clients: Arc::new(PgClientRepository::new(pool.clone(), retry.clone())),
            quotes: Arc::new(PgQuoteRepository::new(pool.clone(), retry.clone())),
            reviews: Arc::new(PgReviewRepository::new(pool.clone(), retry.clone())),
            referrals: Arc::new(PgReferralRepository::new(pool.clone(), retry.clone())),
            saved_items: Arc::new(PgSavedItemRepository::new(pool.clone(), retry.clone())),
            notifications: Arc::new(PgNotificationRepository::new(pool.clone(), retry.clone())),
            payments: Arc::new(PgPaymentRepository::new(pool, retry)),
        }
    }
}

/// Optional outbound integrations.
#[derive(Clone, Default)]
pub struct Integrations {
    pub mailer: Option<Arc<dyn QuoteMailer>>,
    pub firebase: Option<Arc<dyn IdTokenVerifier>>,
}

pub struct ServiceSettings {
    pub policy: PlanPolicy,
    pub public_app_url: String,
}

#[derive(Clone)]
pub struct Services {
    pub user: Arc<UserServiceImpl>,
    pub client: Arc<ClientServiceImpl>,
    pub saved_item: Arc<SavedItemServiceImpl>,
    pub quote: Arc<QuoteServiceImpl>,
    pub review: Arc<ReviewServiceImpl>,
    pub notification: Arc<NotificationServiceImpl>,
    pub dashboard: Arc<DashboardServiceImpl>,
    pub admin: Arc<AdminServiceImpl>,
    pub auth_state: Arc<AuthState>,
}

impl Services {
    pub fn new(
        repos: Repositories,
        jwt_utils: Arc<JwtTokenUtilsImpl>,
        integrations: Integrations,
        settings: ServiceSettings,
    ) -> Self {
        let notification = Arc::new(NotificationServiceImpl::new(repos.notifications.clone()));
        let notifier: Arc<dyn NotificationService> = notification.clone();

        let user = Arc::new(UserServiceImpl::new(
            repos.users.clone(),
            repos.referrals.clone(),
            notifier.clone(),
            jwt_utils.clone(),
            integrations.firebase,
            settings.policy.clone(),
        ));
        let quote = Arc::new(QuoteServiceImpl::new(
            repos.quotes.clone(),
            repos.clients.clone(),
            repos.users.clone(),
            repos.payments.clone(),
            repos.reviews.clone(),
            notifier.clone(),
            integrations.mailer,
            settings.policy.clone(),
            settings.public_app_url,
        ));
        let review = Arc::new(ReviewServiceImpl::new(repos.reviews.clone(), repos.quotes.clone(), notifier));
        let dashboard = Arc::new(DashboardServiceImpl::new(
            repos.quotes.clone(),
            repos.clients.clone(),
            repos.reviews.clone(),
            repos.users.clone(),
            settings.policy,
        ));

        Services {
            user,
            client: Arc::new(ClientServiceImpl::new(repos.clients)),
            saved_item: Arc::new(SavedItemServiceImpl::new(repos.saved_items)),
            quote,
            review,
            notification,
            dashboard,
            admin: Arc::new(AdminServiceImpl::new(repos.users.clone(), repos.quotes)),
            auth_state: Arc::new(AuthState::new(jwt_utils, repos.users)),
        }
    }
}
