use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::handler::dashboard_handler::dashboard_stats_handler;
use crate::middlewares::auth_middleware::{user_auth, AuthState};
use crate::service::dashboard_service::DashboardServiceImpl;

pub fn dashboard_router(service: Arc<DashboardServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/dashboard/stats", get(dashboard_stats_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, user_auth))
        .with_state(service)
}
