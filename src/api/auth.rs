use axum::extract::State;
use sea_orm::DatabaseConnection;

use super::error::ApiJson;
use super::response::ApiResponse;
use crate::domain::DomainError;
use crate::infrastructure::auth::Claims;
use crate::models::user::UserDto;
use crate::services::user_service::{self, AuthPayload, LoginRequest, RegisterRequest};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    responses(
        (status = 201, description = "Account created, returns a bearer token"),
        (status = 400, description = "Invalid payload or email already registered")
    )
)]
pub async fn register(
    State(db): State<DatabaseConnection>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<AuthPayload>, DomainError> {
    let payload = user_service::register(&db, request).await?;
    Ok(ApiResponse::created(payload))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    responses(
        (status = 200, description = "Bearer token valid for 24 hours"),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(db): State<DatabaseConnection>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<ApiResponse<AuthPayload>, DomainError> {
    let payload = user_service::login(&db, request).await?;
    Ok(ApiResponse::ok(payload))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn me(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<ApiResponse<UserDto>, DomainError> {
    let user = user_service::get_user(&db, claims.uid).await?;
    Ok(ApiResponse::ok(UserDto::from(user)))
}
