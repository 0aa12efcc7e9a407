use axum::extract::{Path, State};
use axum::http::StatusCode;
use sea_orm::DatabaseConnection;

use super::error::{ApiJson, ApiQuery};
use super::response::ApiResponse;
use crate::domain::{DomainError, Page};
use crate::infrastructure::auth::Claims;
use crate::models::journal_watch::JournalWatchDto;
use crate::services::journal_watch_service::{
    self, JournalWatchAnalytics, JournalWatchFilter, JournalWatchInput,
};

#[utoipa::path(
    get,
    path = "/api/journal-watch",
    tag = "journal-watch",
    responses(
        (status = 200, description = "Paginated entries, newest publication first")
    )
)]
pub async fn list(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    ApiQuery(filter): ApiQuery<JournalWatchFilter>,
) -> Result<ApiResponse<Page<JournalWatchDto>>, DomainError> {
    let page = journal_watch_service::list_entries(&db, claims.as_ref(), filter).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn retrieve(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<JournalWatchDto>, DomainError> {
    let entry = journal_watch_service::get_entry(&db, claims.as_ref(), id).await?;
    Ok(ApiResponse::ok(entry))
}

pub async fn create(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    ApiJson(input): ApiJson<JournalWatchInput>,
) -> Result<ApiResponse<JournalWatchDto>, DomainError> {
    let entry = journal_watch_service::create_entry(&db, &claims, input).await?;
    Ok(ApiResponse::created(entry))
}

pub async fn update(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<JournalWatchInput>,
) -> Result<ApiResponse<JournalWatchDto>, DomainError> {
    let entry = journal_watch_service::update_entry(&db, &claims, id, input, false).await?;
    Ok(ApiResponse::ok(entry))
}

pub async fn partial_update(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<JournalWatchInput>,
) -> Result<ApiResponse<JournalWatchDto>, DomainError> {
    let entry = journal_watch_service::update_entry(&db, &claims, id, input, true).await?;
    Ok(ApiResponse::ok(entry))
}

pub async fn destroy(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, DomainError> {
    journal_watch_service::delete_entry(&db, &claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_featured(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<JournalWatchDto>, DomainError> {
    let entry = journal_watch_service::toggle_featured(&db, &claims, id).await?;
    Ok(ApiResponse::ok(entry))
}

pub async fn analytics(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<ApiResponse<JournalWatchAnalytics>, DomainError> {
    let report = journal_watch_service::analytics(&db, &claims).await?;
    Ok(ApiResponse::ok(report))
}
