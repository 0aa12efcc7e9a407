//! Per-conversation broadcast groups for the live messaging channel.
//!
//! Each conversation with at least one connected socket owns a
//! `tokio::sync::broadcast` channel. Slow receivers lag and skip events; there
//! is no replay, clients re-fetch over REST after reconnecting.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::message::MessageDto;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    #[serde(rename = "message.created")]
    MessageCreated { message: MessageDto },
    #[serde(rename = "message.updated")]
    MessageUpdated { message: MessageDto },
    #[serde(rename = "message.deleted", rename_all = "camelCase")]
    MessageDeleted {
        conversation_id: i32,
        message_id: i32,
    },
    #[serde(rename = "messages.read", rename_all = "camelCase")]
    MessagesRead {
        conversation_id: i32,
        user_id: i32,
        message_ids: Vec<i32>,
    },
    #[serde(rename = "reaction.toggled", rename_all = "camelCase")]
    ReactionToggled {
        conversation_id: i32,
        message_id: i32,
        user_id: i32,
        emoji: String,
        added: bool,
    },
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        conversation_id: i32,
        user_id: i32,
        is_typing: bool,
    },
    #[serde(rename = "participant.removed", rename_all = "camelCase")]
    ParticipantRemoved { conversation_id: i32, user_id: i32 },
}

impl ChatEvent {
    /// Events that must not be echoed back to the user who caused them.
    pub fn suppressed_for(&self, user_id: i32) -> bool {
        matches!(self, ChatEvent::Typing { user_id: origin, .. } if *origin == user_id)
    }

    /// Whether this event ends `user_id`'s membership of the conversation.
    pub fn revokes(&self, user_id: i32) -> bool {
        matches!(
            self,
            ChatEvent::ParticipantRemoved { user_id: removed, .. } if *removed == user_id
        )
    }
}

#[derive(Clone, Default)]
pub struct ChatHub {
    groups: Arc<DashMap<i32, broadcast::Sender<ChatEvent>>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the conversation group, creating it on first use.
    pub fn subscribe(&self, conversation_id: i32) -> broadcast::Receiver<ChatEvent> {
        self.groups
            .entry(conversation_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Fans the event out to every connected member; returns the receiver count.
    pub fn publish(&self, conversation_id: i32, event: ChatEvent) -> usize {
        match self.groups.get(&conversation_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Drops the group once its last receiver is gone.
    pub fn release(&self, conversation_id: i32) {
        self.groups
            .remove_if(&conversation_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn subscriber_count(&self, conversation_id: i32) -> usize {
        self.groups
            .get(&conversation_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
