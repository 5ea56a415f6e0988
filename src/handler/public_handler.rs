//! Unauthenticated pages reached through a quote's public link.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::dto::quote_dto::RejectRequest;
use crate::handler::{AppJson, parse_id, validate_payload};
use crate::service::quote_service::{QuoteService, QuoteServiceImpl};
use crate::util::error::HandlerError;

pub async fn view_public_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let token = parse_id(&token, "quote")?;
    let view = service.view_public(token).await?;
    Ok(Json(view))
}

pub async fn public_document_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let token = parse_id(&token, "quote")?;
    let document = service.public_document(token).await?;
    Ok(Json(document))
}

pub async fn public_receipt_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let token = parse_id(&token, "quote")?;
    let receipt = service.receipt(token).await?;
    Ok(Json(receipt))
}

pub async fn approve_public_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let token = parse_id(&token, "quote")?;
    let quote = service.approve_public(token).await?;
    Ok(Json(quote))
}

/// The body is optional; an empty request rejects without a reason.
pub async fn reject_public_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Path(token): Path<String>,
    payload: Option<AppJson<RejectRequest>>,
) -> Result<impl IntoResponse, HandlerError> {
    let token = parse_id(&token, "quote")?;
    let payload = payload.map(|AppJson(p)| p).unwrap_or_default();
    validate_payload(&payload)?;
    let quote = service.reject_public(token, payload).await?;
    Ok(Json(quote))
}
