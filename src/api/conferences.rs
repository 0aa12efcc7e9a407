use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use sea_orm::DatabaseConnection;

use super::error::{ApiJson, ApiQuery};
use super::response::ApiResponse;
use super::upload::read_file;
use crate::domain::{DomainError, Page};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::AppState;
use crate::models::conference::ConferenceDto;
use crate::models::conference_registration::RegistrationDto;
use crate::services::conference_service::{
    self, ConferenceAnalytics, ConferenceFilter, ConferenceInput, RegistrationInput,
};

#[utoipa::path(
    get,
    path = "/api/conferences",
    tag = "conferences",
    responses(
        (status = 200, description = "Paginated conferences ordered by start date")
    )
)]
pub async fn list(
    State(db): State<DatabaseConnection>,
    ApiQuery(filter): ApiQuery<ConferenceFilter>,
) -> Result<ApiResponse<Page<ConferenceDto>>, DomainError> {
    let page = conference_service::list_conferences(&db, filter).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn retrieve(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<ConferenceDto>, DomainError> {
    let conference = conference_service::get_conference(&db, id).await?;
    Ok(ApiResponse::ok(conference))
}

pub async fn create(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    ApiJson(input): ApiJson<ConferenceInput>,
) -> Result<ApiResponse<ConferenceDto>, DomainError> {
    let conference = conference_service::create_conference(&db, &claims, input).await?;
    Ok(ApiResponse::created(conference))
}

pub async fn update(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<ConferenceInput>,
) -> Result<ApiResponse<ConferenceDto>, DomainError> {
    let conference = conference_service::update_conference(&db, &claims, id, input, false).await?;
    Ok(ApiResponse::ok(conference))
}

pub async fn partial_update(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<ConferenceInput>,
) -> Result<ApiResponse<ConferenceDto>, DomainError> {
    let conference = conference_service::update_conference(&db, &claims, id, input, true).await?;
    Ok(ApiResponse::ok(conference))
}

pub async fn destroy(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, DomainError> {
    conference_service::delete_conference(state.db(), &state.storage, &claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_featured(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<ConferenceDto>, DomainError> {
    let conference = conference_service::toggle_featured(&db, &claims, id).await?;
    Ok(ApiResponse::ok(conference))
}

pub async fn upload_banner(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<ApiResponse<ConferenceDto>, DomainError> {
    let (filename, data) = read_file(multipart).await?;
    let conference = conference_service::upload_banner(
        state.db(),
        &state.storage,
        &claims,
        id,
        &filename,
        &data,
    )
    .await?;
    Ok(ApiResponse::ok(conference))
}

pub async fn register(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<RegistrationInput>,
) -> Result<ApiResponse<RegistrationDto>, DomainError> {
    let (registration, created) =
        conference_service::register(state.db(), state.mailer.as_ref(), &claims, id, input)
            .await?;
    Ok(ApiResponse::created_if(created, registration).with_message("Registration confirmed."))
}

pub async fn unregister(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<RegistrationDto>, DomainError> {
    let registration = conference_service::unregister(&db, &claims, id).await?;
    Ok(ApiResponse::ok(registration).with_message("Registration cancelled."))
}

pub async fn registrations(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<Vec<RegistrationDto>>, DomainError> {
    let registrations = conference_service::list_registrations(&db, &claims, id).await?;
    Ok(ApiResponse::ok(registrations))
}

pub async fn analytics(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<ApiResponse<ConferenceAnalytics>, DomainError> {
    let report = conference_service::analytics(&db, &claims).await?;
    Ok(ApiResponse::ok(report))
}
