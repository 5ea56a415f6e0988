use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use tracing::info;

use crate::dto::admin_dto::{AdminUserQuery, GrantBonusRequest, SetAdminRequest, SetPlanRequest};
use crate::handler::{AppJson, parse_id, validate_payload};
use crate::middlewares::auth_middleware::AuthUser;
use crate::service::admin_service::{AdminService, AdminServiceImpl};
use crate::util::error::HandlerError;

pub async fn list_users_handler(
    State(service): State<Arc<AdminServiceImpl>>,
    Query(query): Query<AdminUserQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let users = service.list_users(query).await?;
    Ok(Json(users))
}

pub async fn get_user_handler(
    State(service): State<Arc<AdminServiceImpl>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "user")?;
    let user = service.get_user(id).await?;
    Ok(Json(user))
}

pub async fn set_plan_handler(
    State(service): State<Arc<AdminServiceImpl>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<SetPlanRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "user")?;
    validate_payload(&payload)?;
    info!(admin_id = %admin.id, user_id = %id, plan = %payload.plan, "Admin changing plan");
    let user = service.set_plan(id, payload).await?;
    Ok(Json(user))
}

pub async fn set_admin_handler(
    State(service): State<Arc<AdminServiceImpl>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<SetAdminRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "user")?;
    let user = service.set_admin(admin.id, id, payload).await?;
    Ok(Json(user))
}

pub async fn grant_bonus_handler(
    State(service): State<Arc<AdminServiceImpl>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<GrantBonusRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "user")?;
    validate_payload(&payload)?;
    info!(admin_id = %admin.id, user_id = %id, amount = payload.amount, "Admin granting bonus quotes");
    let user = service.grant_bonus_quotes(id, payload).await?;
    Ok(Json(user))
}

pub async fn platform_stats_handler(
    State(service): State<Arc<AdminServiceImpl>>,
) -> Result<impl IntoResponse, HandlerError> {
    let stats = service.platform_stats().await?;
    Ok(Json(stats))
}
