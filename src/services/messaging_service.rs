//! Conversations, messages, read receipts and reactions.
//!
//! Every state change is persisted first and then published to the
//! conversation's live group through [`ChatHub`].
#![allow(clippy::needless_update)] // SeaORM ActiveModels require ..Default::default()

use std::collections::{BTreeMap, HashMap, HashSet};

use sea_orm::sea_query::{OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::domain::{validation, DomainError, FieldErrors, Page, PageRequest, NON_FIELD_ERRORS};
use crate::models::conversation::{self, ConversationDto, Entity as Conversation};
use crate::models::conversation_participant::{self, Entity as Participant};
use crate::models::message::{self, Entity as Message, MessageDto, ReactionSummary};
use crate::models::message_reaction::{self, Entity as Reaction};
use crate::models::message_read_receipt::{self, Entity as ReadReceipt};
use crate::models::user::{self, UserSummary};

use super::chat_hub::{ChatEvent, ChatHub};

const MAX_MESSAGE_CHARS: usize = 5000;
const MAX_EMOJI_CHARS: usize = 16;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationInput {
    pub participant_ids: Vec<i32>,
    pub title: Option<String>,
    pub is_group: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantInput {
    pub user_id: Option<i32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct MessageInput {
    pub content: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ReactionInput {
    pub emoji: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionToggle {
    pub added: bool,
    pub message: MessageDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResult {
    pub conversation_id: i32,
    pub message_ids: Vec<i32>,
}

/// Messages from other people in live (not deleted) state that `user_id`
/// has no receipt for.
fn unread_messages(user_id: i32) -> Select<Message> {
    Message::find()
        .filter(message::Column::SenderId.ne(user_id))
        .filter(message::Column::IsDeleted.eq(false))
        .filter(
            message::Column::Id.not_in_subquery(
                Query::select()
                    .column(message_read_receipt::Column::MessageId)
                    .from(ReadReceipt)
                    .and_where(message_read_receipt::Column::UserId.eq(user_id))
                    .to_owned(),
            ),
        )
}

fn conversations_of(user_id: i32) -> Select<Conversation> {
    Conversation::find().filter(
        conversation::Column::Id.in_subquery(
            Query::select()
                .column(conversation_participant::Column::ConversationId)
                .from(Participant)
                .and_where(conversation_participant::Column::UserId.eq(user_id))
                .to_owned(),
        ),
    )
}

pub async fn is_participant<C: ConnectionTrait>(
    db: &C,
    conversation_id: i32,
    user_id: i32,
) -> Result<bool, DomainError> {
    let found = Participant::find()
        .filter(conversation_participant::Column::ConversationId.eq(conversation_id))
        .filter(conversation_participant::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(found > 0)
}

/// Conversation lookup scoped to its participants; outsiders get a 404.
pub async fn find_for_participant(
    db: &DatabaseConnection,
    user_id: i32,
    conversation_id: i32,
) -> Result<conversation::Model, DomainError> {
    let model = Conversation::find_by_id(conversation_id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    if is_participant(db, conversation_id, user_id).await? {
        Ok(model)
    } else {
        Err(DomainError::NotFound)
    }
}

async fn find_message_for_participant(
    db: &DatabaseConnection,
    user_id: i32,
    message_id: i32,
) -> Result<message::Model, DomainError> {
    let model = Message::find_by_id(message_id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)?;

    if is_participant(db, model.conversation_id, user_id).await? {
        Ok(model)
    } else {
        Err(DomainError::NotFound)
    }
}

/// Attaches receipts and reaction summaries with one query each.
async fn hydrate_messages(
    db: &DatabaseConnection,
    messages: Vec<message::Model>,
) -> Result<Vec<MessageDto>, DomainError> {
    let ids: Vec<i32> = messages.iter().map(|m| m.id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut read_by: HashMap<i32, Vec<i32>> = HashMap::new();
    for receipt in ReadReceipt::find()
        .filter(message_read_receipt::Column::MessageId.is_in(ids.clone()))
        .order_by_asc(message_read_receipt::Column::Id)
        .all(db)
        .await?
    {
        read_by
            .entry(receipt.message_id)
            .or_default()
            .push(receipt.user_id);
    }

    let mut reactions: HashMap<i32, Vec<ReactionSummary>> = HashMap::new();
    for reaction in Reaction::find()
        .filter(message_reaction::Column::MessageId.is_in(ids))
        .order_by_asc(message_reaction::Column::Id)
        .all(db)
        .await?
    {
        let summaries = reactions.entry(reaction.message_id).or_default();
        match summaries.iter_mut().find(|s| s.emoji == reaction.emoji) {
            Some(summary) => {
                summary.count += 1;
                summary.user_ids.push(reaction.user_id);
            }
            None => summaries.push(ReactionSummary {
                emoji: reaction.emoji,
                count: 1,
                user_ids: vec![reaction.user_id],
            }),
        }
    }

    Ok(messages
        .into_iter()
        .map(|m| {
            let id = m.id;
            let mut dto = MessageDto::from(m);
            dto.read_by = read_by.remove(&id).unwrap_or_default();
            dto.reactions = reactions.remove(&id).unwrap_or_default();
            dto
        })
        .collect())
}

async fn hydrate_message(
    db: &DatabaseConnection,
    model: message::Model,
) -> Result<MessageDto, DomainError> {
    hydrate_messages(db, vec![model])
        .await?
        .pop()
        .ok_or_else(|| DomainError::Internal("message vanished while loading".to_string()))
}

async fn participants_by_conversation(
    db: &DatabaseConnection,
    conversation_ids: Vec<i32>,
) -> Result<BTreeMap<i32, Vec<UserSummary>>, DomainError> {
    let rows = Participant::find()
        .filter(conversation_participant::Column::ConversationId.is_in(conversation_ids))
        .find_also_related(user::Entity)
        .order_by_asc(conversation_participant::Column::Id)
        .all(db)
        .await?;

    let mut grouped: BTreeMap<i32, Vec<UserSummary>> = BTreeMap::new();
    for (participant, member) in rows {
        if let Some(member) = member {
            grouped
                .entry(participant.conversation_id)
                .or_default()
                .push(UserSummary::from(&member));
        }
    }
    Ok(grouped)
}

async fn to_dtos(
    db: &DatabaseConnection,
    user_id: i32,
    models: Vec<conversation::Model>,
) -> Result<Vec<ConversationDto>, DomainError> {
    let ids: Vec<i32> = models.iter().map(|c| c.id).collect();
    let mut participants = participants_by_conversation(db, ids).await?;

    let mut dtos = Vec::with_capacity(models.len());
    for model in models {
        let id = model.id;
        let mut dto = ConversationDto::new(model, participants.remove(&id).unwrap_or_default());

        if let Some(last) = Message::find()
            .filter(message::Column::ConversationId.eq(id))
            .order_by_desc(message::Column::Id)
            .one(db)
            .await?
        {
            dto.last_message = Some(hydrate_message(db, last).await?);
        }
        dto.unread_count = unread_messages(user_id)
            .filter(message::Column::ConversationId.eq(id))
            .count(db)
            .await?;

        dtos.push(dto);
    }
    Ok(dtos)
}

async fn to_dto(
    db: &DatabaseConnection,
    user_id: i32,
    model: conversation::Model,
) -> Result<ConversationDto, DomainError> {
    to_dtos(db, user_id, vec![model])
        .await?
        .pop()
        .ok_or(DomainError::NotFound)
}

pub async fn list_conversations(
    db: &DatabaseConnection,
    user_id: i32,
    query: PageQuery,
) -> Result<Page<ConversationDto>, DomainError> {
    let page = PageRequest::new(query.page, query.page_size);
    let results = super::fetch_page(
        db,
        conversations_of(user_id)
            .order_by_desc(conversation::Column::UpdatedAt)
            .order_by_desc(conversation::Column::Id),
        page,
    )
    .await?;

    let dtos = to_dtos(db, user_id, results.results).await?;
    Ok(Page::new(page, results.count, dtos))
}

pub async fn get_conversation(
    db: &DatabaseConnection,
    user_id: i32,
    conversation_id: i32,
) -> Result<ConversationDto, DomainError> {
    let model = find_for_participant(db, user_id, conversation_id).await?;
    to_dto(db, user_id, model).await
}

/// Direct conversation already shared by exactly these two users.
async fn find_direct<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    other_id: i32,
) -> Result<Option<conversation::Model>, DomainError> {
    let candidates = conversations_of(user_id)
        .filter(conversation::Column::IsGroup.eq(false))
        .filter(
            conversation::Column::Id.in_subquery(
                Query::select()
                    .column(conversation_participant::Column::ConversationId)
                    .from(Participant)
                    .and_where(conversation_participant::Column::UserId.eq(other_id))
                    .to_owned(),
            ),
        )
        .order_by_asc(conversation::Column::Id)
        .all(db)
        .await?;

    for candidate in candidates {
        let members = candidate.find_related(Participant).count(db).await?;
        if members == 2 {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Creates a conversation. Returns the conversation and whether it is new;
/// a direct conversation that already exists is returned as-is.
pub async fn create_conversation(
    db: &DatabaseConnection,
    user_id: i32,
    input: ConversationInput,
) -> Result<(ConversationDto, bool), DomainError> {
    let mut others: Vec<i32> = Vec::new();
    for id in input.participant_ids {
        if id != user_id && !others.contains(&id) {
            others.push(id);
        }
    }

    let mut errors = FieldErrors::new();
    if others.is_empty() {
        errors.add("participantIds", "At least one other participant is required.");
    } else {
        let found: HashSet<i32> = user::Entity::find()
            .filter(user::Column::Id.is_in(others.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        for id in &others {
            if !found.contains(id) {
                errors.add("participantIds", format!("User {} does not exist.", id));
            }
        }
    }
    validation::optional_text(&mut errors, "title", input.title.as_deref(), 255);

    let is_group = input.is_group.unwrap_or(others.len() > 1);
    if !is_group && others.len() > 1 {
        errors.add(
            "isGroup",
            "A direct conversation must have exactly one other participant.",
        );
    }
    errors.into_result()?;

    // The direct lookup shares the transaction so the pair gets a single conversation
    let txn = db.begin().await?;
    if !is_group
        && let Some(existing) = find_direct(&txn, user_id, others[0]).await?
    {
        txn.commit().await?;
        return Ok((to_dto(db, user_id, existing).await?, false));
    }

    let now = super::now();

    let model = conversation::ActiveModel {
        title: Set(input
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())),
        is_group: Set(is_group),
        created_by: Set(user_id),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let members = std::iter::once(user_id).chain(others).map(|member| {
        conversation_participant::ActiveModel {
            conversation_id: Set(model.id),
            user_id: Set(member),
            joined_at: Set(now.clone()),
            ..Default::default()
        }
    });
    Participant::insert_many(members).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(
        "Conversation {} created by user {} (group: {})",
        model.id,
        user_id,
        is_group
    );
    Ok((to_dto(db, user_id, model).await?, true))
}

pub async fn add_participant(
    db: &DatabaseConnection,
    user_id: i32,
    conversation_id: i32,
    input: ParticipantInput,
) -> Result<ConversationDto, DomainError> {
    let model = find_for_participant(db, user_id, conversation_id).await?;
    if !model.is_group {
        return Err(DomainError::BadRequest(
            "Participants can only be added to group conversations.".to_string(),
        ));
    }

    let Some(new_member) = input.user_id else {
        return Err(DomainError::field("userId", validation::REQUIRED));
    };
    if user::Entity::find_by_id(new_member).one(db).await?.is_none() {
        return Err(DomainError::field("userId", "User does not exist."));
    }
    if is_participant(db, conversation_id, new_member).await? {
        return Err(DomainError::field(
            NON_FIELD_ERRORS,
            "User is already a participant.",
        ));
    }

    conversation_participant::ActiveModel {
        conversation_id: Set(conversation_id),
        user_id: Set(new_member),
        joined_at: Set(super::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        "User {} added to conversation {} by {}",
        new_member,
        conversation_id,
        user_id
    );
    to_dto(db, user_id, model).await
}

pub async fn remove_participant(
    db: &DatabaseConnection,
    hub: &ChatHub,
    user_id: i32,
    conversation_id: i32,
    target_id: i32,
) -> Result<(), DomainError> {
    let model = find_for_participant(db, user_id, conversation_id).await?;
    if target_id != user_id && model.created_by != user_id {
        return Err(DomainError::Forbidden(
            "Only the conversation creator can remove other participants".to_string(),
        ));
    }

    let removed = Participant::delete_many()
        .filter(conversation_participant::Column::ConversationId.eq(conversation_id))
        .filter(conversation_participant::Column::UserId.eq(target_id))
        .exec(db)
        .await?;
    if removed.rows_affected == 0 {
        return Err(DomainError::NotFound);
    }

    // Open sockets of the removed user close on this event
    hub.publish(
        conversation_id,
        ChatEvent::ParticipantRemoved {
            conversation_id,
            user_id: target_id,
        },
    );

    tracing::info!("User {} left conversation {}", target_id, conversation_id);
    Ok(())
}

/// Newest page first, each page returned in chronological order.
pub async fn list_messages(
    db: &DatabaseConnection,
    user_id: i32,
    conversation_id: i32,
    query: PageQuery,
) -> Result<Page<MessageDto>, DomainError> {
    find_for_participant(db, user_id, conversation_id).await?;

    let page = PageRequest::new(query.page, query.page_size);
    let mut results = super::fetch_page(
        db,
        Message::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .order_by_desc(message::Column::Id),
        page,
    )
    .await?;
    results.results.reverse();

    let messages = hydrate_messages(db, results.results).await?;
    Ok(Page::new(page, results.count, messages))
}

fn clean_content(content: &str) -> Result<String, DomainError> {
    let mut errors = FieldErrors::new();
    validation::required_text(&mut errors, "content", content, MAX_MESSAGE_CHARS);
    errors.into_result()?;
    Ok(content.trim().to_string())
}

pub async fn send_message(
    db: &DatabaseConnection,
    hub: &ChatHub,
    user_id: i32,
    conversation_id: i32,
    input: MessageInput,
) -> Result<MessageDto, DomainError> {
    let conversation = find_for_participant(db, user_id, conversation_id).await?;
    let content = clean_content(&input.content)?;

    let now = super::now();
    let model = message::ActiveModel {
        conversation_id: Set(conversation_id),
        sender_id: Set(user_id),
        content: Set(content),
        is_edited: Set(false),
        is_deleted: Set(false),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut active: conversation::ActiveModel = conversation.into();
    active.updated_at = Set(now);
    active.update(db).await?;

    let dto = hydrate_message(db, model).await?;
    let delivered = hub.publish(
        conversation_id,
        ChatEvent::MessageCreated {
            message: dto.clone(),
        },
    );
    tracing::debug!(
        "Message {} sent to conversation {} ({} live receivers)",
        dto.id,
        conversation_id,
        delivered
    );
    Ok(dto)
}

pub async fn edit_message(
    db: &DatabaseConnection,
    hub: &ChatHub,
    user_id: i32,
    message_id: i32,
    input: MessageInput,
) -> Result<MessageDto, DomainError> {
    let model = find_message_for_participant(db, user_id, message_id).await?;
    if model.sender_id != user_id {
        return Err(DomainError::Forbidden(
            "You can only edit your own messages".to_string(),
        ));
    }
    if model.is_deleted {
        return Err(DomainError::BadRequest(
            "Deleted messages cannot be edited.".to_string(),
        ));
    }
    let content = clean_content(&input.content)?;

    let mut active: message::ActiveModel = model.into();
    active.content = Set(content);
    active.is_edited = Set(true);
    active.updated_at = Set(super::now());
    let model = active.update(db).await?;

    let dto = hydrate_message(db, model).await?;
    hub.publish(
        dto.conversation_id,
        ChatEvent::MessageUpdated {
            message: dto.clone(),
        },
    );
    Ok(dto)
}

pub async fn delete_message(
    db: &DatabaseConnection,
    hub: &ChatHub,
    user_id: i32,
    message_id: i32,
) -> Result<(), DomainError> {
    let model = find_message_for_participant(db, user_id, message_id).await?;
    if model.sender_id != user_id {
        return Err(DomainError::Forbidden(
            "You can only delete your own messages".to_string(),
        ));
    }
    if model.is_deleted {
        return Ok(());
    }

    let conversation_id = model.conversation_id;
    let mut active: message::ActiveModel = model.into();
    active.content = Set(String::new());
    active.is_deleted = Set(true);
    active.updated_at = Set(super::now());
    active.update(db).await?;

    hub.publish(
        conversation_id,
        ChatEvent::MessageDeleted {
            conversation_id,
            message_id,
        },
    );
    Ok(())
}

/// Records receipts for everything unread in the conversation.
pub async fn mark_read(
    db: &DatabaseConnection,
    hub: &ChatHub,
    user_id: i32,
    conversation_id: i32,
) -> Result<ReadResult, DomainError> {
    find_for_participant(db, user_id, conversation_id).await?;

    let message_ids: Vec<i32> = unread_messages(user_id)
        .filter(message::Column::ConversationId.eq(conversation_id))
        .select_only()
        .column(message::Column::Id)
        .order_by_asc(message::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    if !message_ids.is_empty() {
        let now = super::now();
        let receipts = message_ids.iter().map(|id| message_read_receipt::ActiveModel {
            message_id: Set(*id),
            user_id: Set(user_id),
            read_at: Set(now.clone()),
            ..Default::default()
        });
        ReadReceipt::insert_many(receipts)
            .on_conflict(
                OnConflict::columns([
                    message_read_receipt::Column::MessageId,
                    message_read_receipt::Column::UserId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        hub.publish(
            conversation_id,
            ChatEvent::MessagesRead {
                conversation_id,
                user_id,
                message_ids: message_ids.clone(),
            },
        );
    }

    Ok(ReadResult {
        conversation_id,
        message_ids,
    })
}

pub async fn toggle_reaction(
    db: &DatabaseConnection,
    hub: &ChatHub,
    user_id: i32,
    message_id: i32,
    input: ReactionInput,
) -> Result<ReactionToggle, DomainError> {
    let model = find_message_for_participant(db, user_id, message_id).await?;
    if model.is_deleted {
        return Err(DomainError::BadRequest(
            "Deleted messages cannot be reacted to.".to_string(),
        ));
    }

    let mut errors = FieldErrors::new();
    validation::required_text(&mut errors, "emoji", &input.emoji, MAX_EMOJI_CHARS);
    errors.into_result()?;
    let emoji = input.emoji.trim().to_string();

    let existing = Reaction::find()
        .filter(message_reaction::Column::MessageId.eq(message_id))
        .filter(message_reaction::Column::UserId.eq(user_id))
        .filter(message_reaction::Column::Emoji.eq(&emoji))
        .one(db)
        .await?;

    let added = match existing {
        Some(reaction) => {
            reaction.delete(db).await?;
            false
        }
        None => {
            message_reaction::ActiveModel {
                message_id: Set(message_id),
                user_id: Set(user_id),
                emoji: Set(emoji.clone()),
                created_at: Set(super::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
            true
        }
    };

    let conversation_id = model.conversation_id;
    let message = hydrate_message(db, model).await?;
    hub.publish(
        conversation_id,
        ChatEvent::ReactionToggled {
            conversation_id,
            message_id,
            user_id,
            emoji,
            added,
        },
    );

    Ok(ReactionToggle { added, message })
}

pub async fn unread_count(db: &DatabaseConnection, user_id: i32) -> Result<u64, DomainError> {
    let count = unread_messages(user_id)
        .filter(
            message::Column::ConversationId.in_subquery(
                Query::select()
                    .column(conversation_participant::Column::ConversationId)
                    .from(Participant)
                    .and_where(conversation_participant::Column::UserId.eq(user_id))
                    .to_owned(),
            ),
        )
        .count(db)
        .await?;
    Ok(count)
}

/// Relays a typing indicator from a live socket to the rest of the group.
pub fn publish_typing(hub: &ChatHub, conversation_id: i32, user_id: i32, is_typing: bool) {
    hub.publish(
        conversation_id,
        ChatEvent::Typing {
            conversation_id,
            user_id,
            is_typing,
        },
    );
}
