use axum::{middleware, routing::{get, post, put}, Router};
use std::sync::Arc;

use crate::handler::public_handler::{
    approve_public_quote_handler, public_document_handler, public_receipt_handler, reject_public_quote_handler,
    view_public_quote_handler,
};
use crate::handler::quote_handler::{
    create_quote_handler, delete_quote_handler, duplicate_quote_handler, get_quote_handler, list_quotes_handler,
    quote_document_handler, register_payment_handler, send_quote_handler, update_quote_handler,
    update_quote_status_handler,
};
use crate::middlewares::auth_middleware::{user_auth, AuthState};
use crate::service::quote_service::QuoteServiceImpl;

pub fn quote_router(service: Arc<QuoteServiceImpl>, auth_state: Arc<AuthState>) -> Router {
    // Client-facing pages, addressed by the quote's public token
    let public = Router::new()
        .route("/public/quotes/{token}", get(view_public_quote_handler))
        .route("/public/quotes/{token}/document", get(public_document_handler))
        .route("/public/quotes/{token}/receipt", get(public_receipt_handler))
        .route("/public/quotes/{token}/approve", post(approve_public_quote_handler))
        .route("/public/quotes/{token}/reject", post(reject_public_quote_handler));

    let protected = Router::new()
        .route("/quotes", get(list_quotes_handler).post(create_quote_handler))
        .route(
            "/quotes/{id}",
            get(get_quote_handler).put(update_quote_handler).delete(delete_quote_handler),
        )
        .route("/quotes/{id}/send", post(send_quote_handler))
        .route("/quotes/{id}/duplicate", post(duplicate_quote_handler))
        .route("/quotes/{id}/payment", post(register_payment_handler))
        .route("/quotes/{id}/status", put(update_quote_status_handler))
        .route("/quotes/{id}/document", get(quote_document_handler))
        .route_layer(middleware::from_fn_with_state(auth_state, user_auth));

    public.merge(protected).with_state(service)
}
