use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;

use super::error::{ApiJson, ApiQuery};
use super::response::ApiResponse;
use super::upload::read_file;
use crate::domain::{DomainError, Page};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::AppState;
use crate::models::abstract_review::ReviewDto;
use crate::models::abstract_submission::AbstractDto;
use crate::services::abstract_service::{
    self, AbstractAnalytics, AbstractFilter, AbstractInput, ReviewInput, StatusChange,
};

#[utoipa::path(
    get,
    path = "/api/abstracts",
    tag = "abstracts",
    responses(
        (status = 200, description = "Paginated abstracts visible to the caller"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn list(
    State(state): State<AppState>,
    claims: Claims,
    ApiQuery(filter): ApiQuery<AbstractFilter>,
) -> Result<ApiResponse<Page<AbstractDto>>, DomainError> {
    let page = abstract_service::list_abstracts(state.db(), &claims, filter).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn retrieve(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<AbstractDto>, DomainError> {
    let item = abstract_service::get_abstract(state.db(), &claims, id).await?;
    Ok(ApiResponse::ok(item))
}

pub async fn create(
    State(state): State<AppState>,
    claims: Claims,
    ApiJson(input): ApiJson<AbstractInput>,
) -> Result<ApiResponse<AbstractDto>, DomainError> {
    let item = abstract_service::create_abstract(state.db(), &claims, input).await?;
    Ok(ApiResponse::created(item))
}

pub async fn update(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<AbstractInput>,
) -> Result<ApiResponse<AbstractDto>, DomainError> {
    let item = abstract_service::update_abstract(state.db(), &claims, id, input, false).await?;
    Ok(ApiResponse::ok(item))
}

pub async fn partial_update(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<AbstractInput>,
) -> Result<ApiResponse<AbstractDto>, DomainError> {
    let item = abstract_service::update_abstract(state.db(), &claims, id, input, true).await?;
    Ok(ApiResponse::ok(item))
}

pub async fn destroy(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, DomainError> {
    abstract_service::delete_abstract(state.db(), &state.storage, &claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<AbstractDto>, DomainError> {
    let item =
        abstract_service::submit_abstract(state.db(), state.mailer.as_ref(), &claims, id).await?;
    Ok(ApiResponse::ok(item).with_message("Abstract submitted."))
}

pub async fn change_status(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(change): ApiJson<StatusChange>,
) -> Result<ApiResponse<AbstractDto>, DomainError> {
    let item =
        abstract_service::change_status(state.db(), state.mailer.as_ref(), &claims, id, change)
            .await?;
    Ok(ApiResponse::ok(item))
}

pub async fn upload(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<ApiResponse<AbstractDto>, DomainError> {
    let (filename, data) = read_file(multipart).await?;
    let item =
        abstract_service::upload_file(state.db(), &state.storage, &claims, id, &filename, &data)
            .await?;
    Ok(ApiResponse::ok(item))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Vec<ReviewDto>>, DomainError> {
    let reviews = abstract_service::list_reviews(state.db(), &claims, id).await?;
    Ok(ApiResponse::ok(reviews))
}

pub async fn create_review(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<ApiResponse<ReviewDto>, DomainError> {
    let review = abstract_service::create_review(state.db(), &claims, id, input).await?;
    Ok(ApiResponse::created(review))
}

pub async fn analytics(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<ApiResponse<AbstractAnalytics>, DomainError> {
    let report = abstract_service::analytics(state.db(), &claims).await?;
    Ok(ApiResponse::ok(report))
}
