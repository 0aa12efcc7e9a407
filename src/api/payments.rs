use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sea_orm::DatabaseConnection;

use super::error::{ApiJson, ApiQuery};
use super::response::ApiResponse;
use crate::domain::{DomainError, Page};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::AppState;
use crate::models::membership_plan::PlanDto;
use crate::models::payment::PaymentDto;
use crate::modules::integrations::payment_gateway::SIGNATURE_HEADER;
use crate::services::payment_service::{
    self, CheckoutInput, CheckoutResponse, MembershipStatus, PaymentAnalytics, PaymentFilter,
    PlanFilter, PlanInput, WebhookOutcome,
};

#[utoipa::path(
    get,
    path = "/api/payments/plans",
    tag = "payments",
    responses(
        (status = 200, description = "Membership plans; inactive ones only for admins")
    )
)]
pub async fn list_plans(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    ApiQuery(filter): ApiQuery<PlanFilter>,
) -> Result<ApiResponse<Vec<PlanDto>>, DomainError> {
    let plans = payment_service::list_plans(&db, claims.as_ref(), filter).await?;
    Ok(ApiResponse::ok(plans))
}

pub async fn retrieve_plan(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    Path(id): Path<i32>,
) -> Result<ApiResponse<PlanDto>, DomainError> {
    let plan = payment_service::get_plan(&db, claims.as_ref(), id).await?;
    Ok(ApiResponse::ok(plan))
}

pub async fn create_plan(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    ApiJson(input): ApiJson<PlanInput>,
) -> Result<ApiResponse<PlanDto>, DomainError> {
    let plan = payment_service::create_plan(&db, &claims, input).await?;
    Ok(ApiResponse::created(plan))
}

pub async fn update_plan(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<PlanInput>,
) -> Result<ApiResponse<PlanDto>, DomainError> {
    let plan = payment_service::update_plan(&db, &claims, id, input, false).await?;
    Ok(ApiResponse::ok(plan))
}

pub async fn partial_update_plan(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<PlanInput>,
) -> Result<ApiResponse<PlanDto>, DomainError> {
    let plan = payment_service::update_plan(&db, &claims, id, input, true).await?;
    Ok(ApiResponse::ok(plan))
}

pub async fn delete_plan(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, DomainError> {
    payment_service::delete_plan(&db, &claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/payments/checkout",
    tag = "payments",
    responses(
        (status = 201, description = "Pending payment and hosted checkout URL"),
        (status = 400, description = "Unknown or inactive plan"),
        (status = 502, description = "Payment provider unavailable")
    ),
    security(("bearer" = []))
)]
pub async fn checkout(
    State(state): State<AppState>,
    claims: Claims,
    ApiJson(input): ApiJson<CheckoutInput>,
) -> Result<ApiResponse<CheckoutResponse>, DomainError> {
    let session = payment_service::checkout(
        state.db(),
        state.gateway.as_ref(),
        &state.config.payment,
        &claims,
        input,
    )
    .await?;
    Ok(ApiResponse::created(session))
}

/// Raw body is required: the signature covers the exact bytes received.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    tag = "payments",
    responses(
        (status = 200, description = "Event acknowledged"),
        (status = 400, description = "Missing or invalid signature")
    )
)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>, DomainError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = payment_service::handle_webhook(
        state.db(),
        state.mailer.as_ref(),
        &state.config.payment,
        signature,
        &body,
        chrono::Utc::now().timestamp(),
    )
    .await?;
    Ok(Json(outcome))
}

pub async fn list(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    ApiQuery(filter): ApiQuery<PaymentFilter>,
) -> Result<ApiResponse<Page<PaymentDto>>, DomainError> {
    let page = payment_service::list_payments(&db, &claims, filter).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn retrieve(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<PaymentDto>, DomainError> {
    let payment = payment_service::get_payment(&db, &claims, id).await?;
    Ok(ApiResponse::ok(payment))
}

pub async fn membership(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<ApiResponse<MembershipStatus>, DomainError> {
    let status = payment_service::membership_status(&db, &claims).await?;
    Ok(ApiResponse::ok(status))
}

pub async fn analytics(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<ApiResponse<PaymentAnalytics>, DomainError> {
    let report = payment_service::analytics(&db, &claims).await?;
    Ok(ApiResponse::ok(report))
}
