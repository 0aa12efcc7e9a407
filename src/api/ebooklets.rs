use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use sea_orm::DatabaseConnection;

use super::error::{ApiJson, ApiQuery};
use super::response::ApiResponse;
use super::upload::read_file;
use crate::domain::{DomainError, Page};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::AppState;
use crate::models::ebooklet::EbookletDto;
use crate::services::ebooklet_service::{
    self, DownloadLink, EbookletAnalytics, EbookletFilter, EbookletInput,
};

#[utoipa::path(
    get,
    path = "/api/ebooklets",
    tag = "ebooklets",
    responses(
        (status = 200, description = "Paginated ebooklets; unpublished ones only for admins")
    )
)]
pub async fn list(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    ApiQuery(filter): ApiQuery<EbookletFilter>,
) -> Result<ApiResponse<Page<EbookletDto>>, DomainError> {
    let page = ebooklet_service::list_ebooklets(&db, claims.as_ref(), filter).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn retrieve(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<EbookletDto>, DomainError> {
    let ebooklet = ebooklet_service::get_ebooklet(&db, claims.as_ref(), id).await?;
    Ok(ApiResponse::ok(ebooklet))
}

pub async fn create(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    ApiJson(input): ApiJson<EbookletInput>,
) -> Result<ApiResponse<EbookletDto>, DomainError> {
    let ebooklet = ebooklet_service::create_ebooklet(&db, &claims, input).await?;
    Ok(ApiResponse::created(ebooklet))
}

pub async fn update(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<EbookletInput>,
) -> Result<ApiResponse<EbookletDto>, DomainError> {
    let ebooklet = ebooklet_service::update_ebooklet(&db, &claims, id, input, false).await?;
    Ok(ApiResponse::ok(ebooklet))
}

pub async fn partial_update(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<EbookletInput>,
) -> Result<ApiResponse<EbookletDto>, DomainError> {
    let ebooklet = ebooklet_service::update_ebooklet(&db, &claims, id, input, true).await?;
    Ok(ApiResponse::ok(ebooklet))
}

pub async fn destroy(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, DomainError> {
    ebooklet_service::delete_ebooklet(state.db(), &state.storage, &claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_featured(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<EbookletDto>, DomainError> {
    let ebooklet = ebooklet_service::toggle_featured(&db, &claims, id).await?;
    Ok(ApiResponse::ok(ebooklet))
}

pub async fn upload(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<ApiResponse<EbookletDto>, DomainError> {
    let (filename, data) = read_file(multipart).await?;
    let ebooklet =
        ebooklet_service::upload_file(state.db(), &state.storage, &claims, id, &filename, &data)
            .await?;
    Ok(ApiResponse::ok(ebooklet))
}

pub async fn upload_cover(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<ApiResponse<EbookletDto>, DomainError> {
    let (filename, data) = read_file(multipart).await?;
    let ebooklet =
        ebooklet_service::upload_cover(state.db(), &state.storage, &claims, id, &filename, &data)
            .await?;
    Ok(ApiResponse::ok(ebooklet))
}

pub async fn download(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<DownloadLink>, DomainError> {
    let link = ebooklet_service::download(&db, claims.as_ref(), id).await?;
    Ok(ApiResponse::ok(link))
}

pub async fn analytics(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<ApiResponse<EbookletAnalytics>, DomainError> {
    let report = ebooklet_service::analytics(&db, &claims).await?;
    Ok(ApiResponse::ok(report))
}
