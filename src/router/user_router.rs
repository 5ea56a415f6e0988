use axum::{middleware, routing::{get, post}, Router};
use std::sync::Arc;

use crate::handler::user_handler::{
    firebase_login_handler, get_profile_handler, login_handler, plan_usage_handler, referrals_handler,
    refresh_token_handler, register_handler, update_profile_handler,
};
use crate::middlewares::auth_middleware::{user_auth, AuthState};
use crate::service::user_service::UserServiceImpl;

pub fn user_router(service: Arc<UserServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    let public = Router::new()
        .route("/users/register", post(register_handler))
        .route("/users/login", post(login_handler))
        .route("/users/refresh-token", post(refresh_token_handler))
        .route("/users/firebase-login", post(firebase_login_handler));

    let protected = Router::new()
        .route("/users/me", get(get_profile_handler).put(update_profile_handler))
        .route("/users/me/plan", get(plan_usage_handler))
        .route("/users/me/referrals", get(referrals_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, user_auth));

    public.merge(protected).with_state(service)
}
