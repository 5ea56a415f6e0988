use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::dto::common::PaginationQuery;
use crate::dto::review_dto::{RespondReviewRequest, SubmitReviewRequest};
use crate::handler::{AppJson, parse_id, validate_payload};
use crate::middlewares::auth_middleware::AuthUser;
use crate::service::review_service::{ReviewService, ReviewServiceImpl};
use crate::util::error::HandlerError;

pub async fn submit_review_handler(
    State(service): State<Arc<ReviewServiceImpl>>,
    Path(token): Path<String>,
    AppJson(payload): AppJson<SubmitReviewRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let token = parse_id(&token, "quote")?;
    validate_payload(&payload)?;
    let review = service.submit_public_review(token, payload).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_reviews_handler(
    State(service): State<Arc<ReviewServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Query(paging): Query<PaginationQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let reviews = service.list_reviews(user.id, paging).await?;
    Ok(Json(reviews))
}

pub async fn respond_review_handler(
    State(service): State<Arc<ReviewServiceImpl>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<RespondReviewRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let id = parse_id(&id, "review")?;
    validate_payload(&payload)?;
    let review = service.respond(user.id, id, payload).await?;
    Ok(Json(review))
}
