use axum::{middleware, routing::{get, post, put}, Router};
use std::sync::Arc;

use crate::handler::admin_handler::{
    get_user_handler, grant_bonus_handler, list_users_handler, platform_stats_handler, set_admin_handler,
    set_plan_handler,
};
use crate::middlewares::auth_middleware::{admin_auth, AuthState};
use crate::service::admin_service::AdminServiceImpl;

pub fn admin_router(service: Arc<AdminServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/admin/users", get(list_users_handler))
        .route("/admin/users/{id}", get(get_user_handler))
        .route("/admin/users/{id}/plan", put(set_plan_handler))
        .route("/admin/users/{id}/admin", put(set_admin_handler))
        .route("/admin/users/{id}/bonus-quotes", post(grant_bonus_handler))
        .route("/admin/stats", get(platform_stats_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, admin_auth))
        .with_state(service)
}
