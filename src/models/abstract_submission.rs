use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{json_list, AbstractAuthor};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "abstracts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub content: String,
    pub authors: String,  // JSON array of AbstractAuthor
    pub keywords: String, // JSON array
    pub category: String,
    pub presentation_type: String,
    pub status: String,
    pub submitter_id: i32,
    pub conference_id: Option<i32>,
    pub file_url: Option<String>,
    pub submitted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::SubmitterId",
        to = "super::user::Column::Id"
    )]
    Submitter,
    #[sea_orm(
        belongs_to = "super::conference::Entity",
        from = "Column::ConferenceId",
        to = "super::conference::Column::Id"
    )]
    Conference,
    #[sea_orm(has_many = "super::abstract_review::Entity")]
    Reviews,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submitter.def()
    }
}

impl Related<super::conference::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conference.def()
    }
}

impl Related<super::abstract_review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractDto {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub word_count: usize,
    pub authors: Vec<AbstractAuthor>,
    pub keywords: Vec<String>,
    pub category: String,
    pub presentation_type: String,
    pub status: String,
    pub submitter_id: i32,
    pub conference_id: Option<i32>,
    pub file_url: Option<String>,
    pub submitted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
}

impl From<Model> for AbstractDto {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            word_count: crate::domain::validation::word_count(&model.content),
            title: model.title,
            content: model.content,
            authors: json_list(&model.authors),
            keywords: json_list(&model.keywords),
            category: model.category,
            presentation_type: model.presentation_type,
            status: model.status,
            submitter_id: model.submitter_id,
            conference_id: model.conference_id,
            file_url: model.file_url,
            submitted_at: model.submitted_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
            review_count: None,
            average_score: None,
        }
    }
}
