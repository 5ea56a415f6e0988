use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::middlewares::auth_middleware::AuthUser;
use crate::service::dashboard_service::{DashboardService, DashboardServiceImpl};
use crate::util::error::HandlerError;

pub async fn dashboard_stats_handler(
    State(service): State<Arc<DashboardServiceImpl>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, HandlerError> {
    let stats = service.stats(user.id).await?;
    Ok(Json(stats))
}
