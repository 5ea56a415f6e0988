use axum::{middleware, routing::{get, post, put}, Router};
use std::sync::Arc;

use crate::handler::review_handler::{list_reviews_handler, respond_review_handler, submit_review_handler};
use crate::middlewares::auth_middleware::{user_auth, AuthState};
use crate::service::review_service::ReviewServiceImpl;

pub fn review_router(service: Arc<ReviewServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    let public = Router::new().route("/public/quotes/{token}/review", post(submit_review_handler));

    let protected = Router::new()
        .route("/reviews", get(list_reviews_handler))
        .route("/reviews/{id}/response", put(respond_review_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, user_auth));

    public.merge(protected).with_state(service)
}
