use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::repository::user_repo::UserRepository;
use crate::util::error::{HandlerError, ServiceError};
use crate::util::jwt::{Claims, JwtTokenUtils, JwtTokenUtilsImpl};

pub struct AuthState {
    pub jwt_utils: Arc<JwtTokenUtilsImpl>,
    /// Admin routes check the stored `is_admin` flag, not the token role.
    pub user_repo: Arc<dyn UserRepository>,
}

impl AuthState {
    pub fn new(jwt_utils: Arc<JwtTokenUtilsImpl>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self { jwt_utils, user_repo }
    }
}

/// Authenticated caller, available to handlers as `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

fn authenticate(state: &AuthState, req: &Request<Body>) -> Result<(AuthUser, Claims), HandlerError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HandlerError::unauthorized("Missing authorization header"))?;

    let token = state
        .jwt_utils
        .extract_token_from_header(auth_header)
        .map_err(|_| HandlerError::unauthorized("Invalid authorization header"))?;
    let claims = state.jwt_utils.validate_access_token(&token).map_err(|e| {
        warn!("Rejected access token: {}", e);
        HandlerError::unauthorized("Invalid or expired token")
    })?;
    let id = claims
        .user_id()
        .map_err(|_| HandlerError::unauthorized("Invalid token subject"))?;

    let user = AuthUser { id, email: claims.email.clone(), is_admin: claims.is_admin() };
    Ok((user, claims))
}

pub async fn user_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, HandlerError> {
    let (user, claims) = authenticate(&state, &req)?;
    req.extensions_mut().insert(user);
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub async fn admin_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, HandlerError> {
    let (mut user, claims) = authenticate(&state, &req)?;
    let stored = state
        .user_repo
        .find_by_id(user.id)
        .await
        .map_err(|e| HandlerError::from(ServiceError::from(e)))?;
    if !stored.as_ref().is_some_and(|u| u.is_admin) {
        warn!(user_id = %user.id, token_admin = user.is_admin, "Non-admin user on admin route");
        return Err(HandlerError::forbidden("Admin access required"));
    }
    user.is_admin = true;
    req.extensions_mut().insert(user);
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
