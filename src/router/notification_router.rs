use axum::{middleware, routing::{get, put}, Router};
use std::sync::Arc;

use crate::handler::notification_handler::{
    list_notifications_handler, mark_all_read_handler, mark_notification_read_handler,
};
use crate::middlewares::auth_middleware::{user_auth, AuthState};
use crate::service::notification_service::NotificationServiceImpl;

pub fn notification_router(service: Arc<NotificationServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/notifications", get(list_notifications_handler))
        .route("/notifications/read-all", put(mark_all_read_handler))
        .route("/notifications/{id}/read", put(mark_notification_read_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, user_auth))
        .with_state(service)
}
