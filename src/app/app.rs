use axum::{routing::get, Json, Router};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::app::services::{Integrations, Repositories, ServiceSettings, Services};
use crate::config::{
    AdminUserConfig, AppConfig, ConfigError, EmailConfig, FirebaseConfig, JwtConfig, PlanConfig, PostgresConfig,
};
use crate::middlewares::cors::cors_layer;
use crate::repository::database;
use crate::router::admin_router::admin_router;
use crate::router::client_router::client_router;
use crate::router::dashboard_router::dashboard_router;
use crate::router::notification_router::notification_router;
use crate::router::quote_router::quote_router;
use crate::router::review_router::review_router;
use crate::router::saved_item_router::saved_item_router;
use crate::router::user_router::user_router;
use crate::service::plan_service::PlanPolicy;
use crate::service::user_service::UserService;
use crate::util::db_retry::RetryPolicy;
use crate::util::email::{QuoteMailer, SmtpEmailService};
use crate::util::firebase::{FirebaseTokenVerifier, IdTokenVerifier};
use crate::util::jwt::JwtTokenUtilsImpl;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
    #[error("Invalid listen address: {0}")]
    Address(String),
}

pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Every route of the API, with request tracing and CORS.
pub fn build_router(services: &Services, cors_origin: Option<&str>) -> Router {
    let auth = services.auth_state.clone();
    Router::new()
        .route("/health", get(health_handler))
        .merge(user_router(services.user.clone(), auth.clone()))
        .merge(client_router(services.client.clone(), auth.clone()))
        .merge(saved_item_router(services.saved_item.clone(), auth.clone()))
        .merge(quote_router(services.quote.clone(), auth.clone()))
        .merge(review_router(services.review.clone(), auth.clone()))
        .merge(notification_router(services.notification.clone(), auth.clone()))
        .merge(dashboard_router(services.dashboard.clone(), auth.clone()))
        .merge(admin_router(services.admin.clone(), auth))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
}

pub struct App {
    config: AppConfig,
    router: Router,
    pub services: Services,
}

impl App {
    pub async fn new() -> Result<Self, StartupError> {
        let config = AppConfig::from_env()?;
        let postgres_config = PostgresConfig::from_env()?;
        let jwt_config = JwtConfig::from_env()?;
        let plan_config = PlanConfig::from_env()?;

        let pool = database::connect(&postgres_config).await?;
        database::run_migrations(&pool).await?;
        let repos = Repositories::postgres(pool, RetryPolicy::from_config(&postgres_config));

        let integrations = Integrations { mailer: Self::mailer(), firebase: Self::firebase() };
        let settings = ServiceSettings {
            policy: PlanPolicy::from(&plan_config),
            public_app_url: config.public_app_url.clone(),
        };
        let jwt_utils = Arc::new(JwtTokenUtilsImpl::new(jwt_config));
        let services = Services::new(repos, jwt_utils, integrations, settings);

        let router = build_router(&services, config.cors_allowed_origin.as_deref());
        let app = App { config, router, services };
        app.create_first_admin_user().await;
        Ok(app)
    }

    fn mailer() -> Option<Arc<dyn QuoteMailer>> {
        let config = match EmailConfig::from_env() {
            Ok(c) => c,
            Err(e) => {
                warn!("SMTP not configured, quote emails disabled: {e}");
                return None;
            }
        };
        match SmtpEmailService::new(config) {
            Ok(service) => Some(Arc::new(service)),
            Err(e) => {
                error!("Failed to set up SMTP transport: {e}");
                None
            }
        }
    }

    fn firebase() -> Option<Arc<dyn IdTokenVerifier>> {
        match FirebaseConfig::from_env() {
            Ok(config) => Some(Arc::new(FirebaseTokenVerifier::new(config))),
            Err(e) => {
                warn!("Firebase not configured, social login disabled: {e}");
                None
            }
        }
    }

    pub async fn start(self) -> Result<(), StartupError> {
        let host: IpAddr = self
            .config
            .host
            .parse()
            .map_err(|_| StartupError::Address(self.config.host.clone()))?;
        let addr = SocketAddr::new(host, self.config.port);
        info!("Server running at http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }

    async fn create_first_admin_user(&self) {
        let admin_conf = match AdminUserConfig::from_env() {
            Ok(c) => c,
            Err(e) => {
                warn!("Admin user config not loaded: {e}");
                return;
            }
        };
        match self.services.user.ensure_admin(&admin_conf).await {
            Ok(admin) => info!(user_id = %admin.id, "Admin user ready"),
            Err(e) => error!("Failed to create admin user: {e}"),
        }
    }
}
