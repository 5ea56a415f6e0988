use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use tracing::info;

use crate::dto::quote_dto::{PaymentRequest, QuoteListQuery, QuoteRequest, UpdateStatusRequest};
use crate::handler::{AppJson, parse_id, validate_payload};
use crate::middlewares::auth_middleware::AuthUser;
use crate::service::quote_service::{QuoteService, QuoteServiceImpl};
use crate::util::error::HandlerError;

pub async fn create_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<QuoteRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_payload(&payload)?;
    let quote = service.create_quote(user.id, payload).await?;
    info!(quote_id = %quote.quote.id, "Quote created");
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn list_quotes_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<QuoteListQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let page = service.list_quotes(user.id, query).await?;
    Ok(Json(page))
}

pub async fn get_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "quote")?;
    let quote = service.get_quote(user.id, id).await?;
    Ok(Json(quote))
}

pub async fn update_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<QuoteRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "quote")?;
    validate_payload(&payload)?;
    let quote = service.update_quote(user.id, id, payload).await?;
    Ok(Json(quote))
}

pub async fn delete_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "quote")?;
    service.delete_quote(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn send_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "quote")?;
    let quote = service.send_quote(user.id, id).await?;
    Ok(Json(quote))
}

pub async fn duplicate_quote_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "quote")?;
    let quote = service.duplicate_quote(user.id, id).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

pub async fn update_quote_status_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "quote")?;
    validate_payload(&payload)?;
    let quote = service.update_status(user.id, id, payload).await?;
    Ok(Json(quote))
}

pub async fn register_payment_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<PaymentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "quote")?;
    validate_payload(&payload)?;
    let quote = service.register_payment(user.id, id, payload).await?;
    Ok(Json(quote))
}

pub async fn quote_document_handler(
    State(service): State<Arc<QuoteServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "quote")?;
    let document = service.document(user.id, id).await?;
    Ok(Json(document))
}
