use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;

use super::error::{ApiJson, ApiQuery};
use super::response::ApiResponse;
use crate::domain::{DomainError, Page};
use crate::infrastructure::auth::Claims;
use crate::infrastructure::AppState;
use crate::models::conversation::ConversationDto;
use crate::models::message::MessageDto;
use crate::services::messaging_service::{
    self, ConversationInput, MessageInput, PageQuery, ParticipantInput, ReactionInput,
    ReactionToggle, ReadResult,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: u64,
}

#[utoipa::path(
    get,
    path = "/api/messaging/conversations",
    tag = "messaging",
    responses(
        (status = 200, description = "Conversations of the caller, latest activity first"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Page<ConversationDto>>, DomainError> {
    let page = messaging_service::list_conversations(state.db(), claims.uid, query).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    claims: Claims,
    ApiJson(input): ApiJson<ConversationInput>,
) -> Result<ApiResponse<ConversationDto>, DomainError> {
    let (conversation, created) =
        messaging_service::create_conversation(state.db(), claims.uid, input).await?;
    Ok(ApiResponse::created_if(created, conversation))
}

pub async fn retrieve_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<ConversationDto>, DomainError> {
    let conversation = messaging_service::get_conversation(state.db(), claims.uid, id).await?;
    Ok(ApiResponse::ok(conversation))
}

pub async fn add_participant(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<ParticipantInput>,
) -> Result<ApiResponse<ConversationDto>, DomainError> {
    let conversation =
        messaging_service::add_participant(state.db(), claims.uid, id, input).await?;
    Ok(ApiResponse::ok(conversation))
}

pub async fn remove_participant(
    State(state): State<AppState>,
    claims: Claims,
    Path((id, user_id)): Path<(i32, i32)>,
) -> Result<StatusCode, DomainError> {
    messaging_service::remove_participant(state.db(), &state.hub, claims.uid, id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<ApiResponse<Page<MessageDto>>, DomainError> {
    let page = messaging_service::list_messages(state.db(), claims.uid, id, query).await?;
    Ok(ApiResponse::ok(page))
}

pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<MessageInput>,
) -> Result<ApiResponse<MessageDto>, DomainError> {
    let message =
        messaging_service::send_message(state.db(), &state.hub, claims.uid, id, input).await?;
    Ok(ApiResponse::created(message))
}

pub async fn mark_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<ApiResponse<ReadResult>, DomainError> {
    let result = messaging_service::mark_read(state.db(), &state.hub, claims.uid, id).await?;
    Ok(ApiResponse::ok(result))
}

pub async fn edit_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<MessageInput>,
) -> Result<ApiResponse<MessageDto>, DomainError> {
    let message =
        messaging_service::edit_message(state.db(), &state.hub, claims.uid, id, input).await?;
    Ok(ApiResponse::ok(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
) -> Result<StatusCode, DomainError> {
    messaging_service::delete_message(state.db(), &state.hub, claims.uid, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_reaction(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i32>,
    ApiJson(input): ApiJson<ReactionInput>,
) -> Result<ApiResponse<ReactionToggle>, DomainError> {
    let toggle =
        messaging_service::toggle_reaction(state.db(), &state.hub, claims.uid, id, input).await?;
    Ok(ApiResponse::ok(toggle))
}

pub async fn unread_count(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<ApiResponse<UnreadCount>, DomainError> {
    let unread_count = messaging_service::unread_count(state.db(), claims.uid).await?;
    Ok(ApiResponse::ok(UnreadCount { unread_count }))
}
