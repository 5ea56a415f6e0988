use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::dto::saved_item_dto::{SavedItemQuery, SavedItemRequest};
use crate::handler::{AppJson, parse_id, validate_payload};
use crate::middlewares::auth_middleware::AuthUser;
use crate::service::saved_item_service::{SavedItemService, SavedItemServiceImpl};
use crate::util::error::HandlerError;

pub async fn create_saved_item_handler(
    State(service): State<Arc<SavedItemServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<SavedItemRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_payload(&payload)?;
    let item = service.create_item(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn list_saved_items_handler(
    State(service): State<Arc<SavedItemServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SavedItemQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let items = service.list_items(user.id, query).await?;
    Ok(Json(items))
}

pub async fn update_saved_item_handler(
    State(service): State<Arc<SavedItemServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<SavedItemRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "saved item")?;
    validate_payload(&payload)?;
    let item = service.update_item(user.id, id, payload).await?;
    Ok(Json(item))
}

pub async fn delete_saved_item_handler(
    State(service): State<Arc<SavedItemServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "saved item")?;
    service.delete_item(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
