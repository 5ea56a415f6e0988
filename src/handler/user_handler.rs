use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;
use tracing::info;

use crate::dto::user_dto::{
    FirebaseLoginRequest, LoginRequest, RefreshTokenRequest, RegisterRequest, UpdateProfileRequest,
};
use crate::handler::{AppJson, validate_payload};
use crate::middlewares::auth_middleware::AuthUser;
use crate::service::user_service::{UserService, UserServiceImpl};
use crate::util::error::HandlerError;

pub async fn register_handler(
    State(service): State<Arc<UserServiceImpl>>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_payload(&payload)?;
    let res = service.register(payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

pub async fn login_handler(
    State(service): State<Arc<UserServiceImpl>>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_payload(&payload)?;
    let res = service.login(payload).await?;
    Ok(Json(res))
}

pub async fn refresh_token_handler(
    State(service): State<Arc<UserServiceImpl>>,
    AppJson(payload): AppJson<RefreshTokenRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_payload(&payload)?;
    let tokens = service.refresh_token(payload.refresh_token).await?;
    Ok(Json(tokens))
}

pub async fn firebase_login_handler(
    State(service): State<Arc<UserServiceImpl>>,
    AppJson(payload): AppJson<FirebaseLoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_payload(&payload)?;
    let res = service.firebase_login(payload).await?;
    Ok(Json(res))
}

pub async fn get_profile_handler(
    State(service): State<Arc<UserServiceImpl>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    let profile = service.get_profile(user.id).await?;
    Ok(Json(profile))
}

pub async fn update_profile_handler(
    State(service): State<Arc<UserServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    validate_payload(&payload)?;
    let profile = service.update_profile(user.id, payload).await?;
    info!(user_id = %user.id, "Profile updated");
    Ok(Json(profile))
}

pub async fn plan_usage_handler(
    State(service): State<Arc<UserServiceImpl>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    let usage = service.get_plan_usage(user.id).await?;
    Ok(Json(usage))
}

pub async fn referrals_handler(
    State(service): State<Arc<UserServiceImpl>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    let summary = service.referral_summary(user.id).await?;
    Ok(Json(summary))
}
