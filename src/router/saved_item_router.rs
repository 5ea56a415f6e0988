use axum::{middleware, routing::{get, put}, Router};
use std::sync::Arc;

use crate::handler::saved_item_handler::{
    create_saved_item_handler, delete_saved_item_handler, list_saved_items_handler, update_saved_item_handler,
};
use crate::middlewares::auth_middleware::{user_auth, AuthState};
use crate::service::saved_item_service::SavedItemServiceImpl;

pub fn saved_item_router(service: Arc<SavedItemServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/saved-items", get(list_saved_items_handler).post(create_saved_item_handler))
        .route("/saved-items/{id}", put(update_saved_item_handler).delete(delete_saved_item_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, user_auth))
        .with_state(service)
}
