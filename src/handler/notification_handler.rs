use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::dto::notification_dto::NotificationQuery;
use crate::handler::parse_id;
use crate::middlewares::auth_middleware::AuthUser;
use crate::service::notification_service::{NotificationService, NotificationServiceImpl};
use crate::util::error::HandlerError;

pub async fn list_notifications_handler(
    State(service): State<Arc<NotificationServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let list = service.list(user.id, query).await?;
    Ok(Json(list))
}

pub async fn mark_notification_read_handler(
    State(service): State<Arc<NotificationServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "notification")?;
    service.mark_read(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read_handler(
    State(service): State<Arc<NotificationServiceImpl>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    let res = service.mark_all_read(user.id).await?;
    Ok(Json(res))
}
