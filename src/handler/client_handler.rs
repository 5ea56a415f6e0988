use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::dto::client_dto::{ClientListQuery, ClientRequest};
use crate::handler::{AppJson, parse_id, validate_payload};
use crate::middlewares::auth_middleware::AuthUser;
use crate::service::client_service::{ClientService, ClientServiceImpl};
use crate::util::error::HandlerError;

pub async fn create_client_handler(
    State(service): State<Arc<ClientServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<ClientRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_payload(&payload)?;
    let client = service.create_client(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn list_clients_handler(
    State(service): State<Arc<ClientServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ClientListQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let page = service.list_clients(user.id, query).await?;
    Ok(Json(page))
}

pub async fn get_client_handler(
    State(service): State<Arc<ClientServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "client")?;
    let client = service.get_client(user.id, id).await?;
    Ok(Json(client))
}

pub async fn update_client_handler(
    State(service): State<Arc<ClientServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<ClientRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "client")?;
    validate_payload(&payload)?;
    let client = service.update_client(user.id, id, payload).await?;
    Ok(Json(client))
}

pub async fn delete_client_handler(
    State(service): State<Arc<ClientServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "client")?;
    service.delete_client(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
