use axum::extract::{Path, State};
use axum::http::StatusCode;
use sea_orm::DatabaseConnection;

use super::error::{ApiJson, ApiQuery};
use super::response::ApiResponse;
use crate::domain::{DomainError, Page};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::AppState;
use crate::models::contact_message::ContactMessageDto;
use crate::models::newsletter_subscriber::SubscriberDto;
use crate::services::subscription_service::{
    self, ContactFilter, ContactInput, ContactStatusInput, SubscribeInput, SubscribeOutcome,
    SubscriberFilter, SubscriptionAnalytics, UnsubscribeInput,
};

#[utoipa::path(
    post,
    path = "/api/newsletter/subscribe",
    tag = "subscriptions",
    responses(
        (status = 201, description = "New subscriber"),
        (status = 200, description = "Reactivated or already subscribed"),
        (status = 400, description = "Invalid email")
    )
)]
pub async fn subscribe(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SubscribeInput>,
) -> Result<ApiResponse<SubscriberDto>, DomainError> {
    let (subscriber, outcome) =
        subscription_service::subscribe(state.db(), state.mailer.as_ref(), input).await?;
    Ok(
        ApiResponse::created_if(outcome == SubscribeOutcome::Created, subscriber)
            .with_message(outcome.message()),
    )
}

pub async fn unsubscribe(
    State(db): State<DatabaseConnection>,
    ApiJson(input): ApiJson<UnsubscribeInput>,
) -> Result<ApiResponse<SubscriberDto>, DomainError> {
    let subscriber = subscription_service::unsubscribe(&db, input).await?;
    Ok(ApiResponse::ok(subscriber).with_message("You have been unsubscribed."))
}

pub async fn list_subscribers(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    ApiQuery(filter): ApiQuery<SubscriberFilter>,
) -> Result<ApiResponse<Page<SubscriberDto>>, DomainError> {
    let page = subscription_service::list_subscribers(&db, &claims, filter).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn delete_subscriber(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, DomainError> {
    subscription_service::delete_subscriber(&db, &claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/contact",
    tag = "subscriptions",
    responses(
        (status = 201, description = "Message stored and acknowledged by email"),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_contact(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ContactInput>,
) -> Result<ApiResponse<ContactMessageDto>, DomainError> {
    let message = subscription_service::create_contact(
        state.db(),
        state.mailer.as_ref(),
        &state.config.contact_inbox,
        input,
    )
    .await?;
    Ok(ApiResponse::created(message).with_message("Thank you, we will get back to you shortly."))
}

pub async fn list_contacts(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    ApiQuery(filter): ApiQuery<ContactFilter>,
) -> Result<ApiResponse<Page<ContactMessageDto>>, DomainError> {
    let page = subscription_service::list_contacts(&db, &claims, filter).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn retrieve_contact(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<ContactMessageDto>, DomainError> {
    let message = subscription_service::get_contact(&db, &claims, id).await?;
    Ok(ApiResponse::ok(message))
}

pub async fn update_contact_status(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<ContactStatusInput>,
) -> Result<ApiResponse<ContactMessageDto>, DomainError> {
    let message = subscription_service::update_contact_status(&db, &claims, id, input).await?;
    Ok(ApiResponse::ok(message))
}

pub async fn delete_contact(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, DomainError> {
    subscription_service::delete_contact(&db, &claims, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn analytics(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> Result<ApiResponse<SubscriptionAnalytics>, DomainError> {
    let report = subscription_service::analytics(&db, &claims).await?;
    Ok(ApiResponse::ok(report))
}
