use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: Option<String>,
    pub is_group: bool,
    pub created_by: i32,
    pub created_at: String,
    /// Bumped on every new message; drives list ordering.
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::conversation_participant::Entity")]
    Participants,
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::conversation_participant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participants.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: i32,
    pub title: Option<String>,
    pub is_group: bool,
    pub created_by: i32,
    pub created_at: String,
    pub updated_at: String,
    pub participants: Vec<super::user::UserSummary>,
    pub last_message: Option<super::message::MessageDto>,
    pub unread_count: u64,
}

impl ConversationDto {
    pub fn new(model: Model, participants: Vec<super::user::UserSummary>) -> Self {
        Self {
            id: model.id,
            title: model.title,
            is_group: model.is_group,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
            participants,
            last_message: None,
            unread_count: 0,
        }
    }
}
