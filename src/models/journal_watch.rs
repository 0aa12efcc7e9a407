use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::json_list;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_watch_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub journal_name: String,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub article_url: Option<String>,
    pub summary: Option<String>,
    pub commentary: Option<String>,
    pub authors: String,  // JSON array
    pub keywords: String, // JSON array
    pub category: String,
    pub is_featured: bool,
    pub is_published: bool,
    pub view_count: i64,
    pub reviewer_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReviewerId",
        to = "super::user::Column::Id"
    )]
    Reviewer,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviewer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalWatchDto {
    pub id: i32,
    pub title: String,
    pub journal_name: String,
    pub publication_date: Option<String>,
    pub doi: Option<String>,
    pub article_url: Option<String>,
    pub summary: Option<String>,
    pub commentary: Option<String>,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
    pub category: String,
    pub is_featured: bool,
    pub is_published: bool,
    pub view_count: i64,
    pub reviewer_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Model> for JournalWatchDto {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            journal_name: model.journal_name,
            publication_date: model.publication_date,
            doi: model.doi,
            article_url: model.article_url,
            summary: model.summary,
            commentary: model.commentary,
            authors: json_list(&model.authors),
            keywords: json_list(&model.keywords),
            category: model.category,
            is_featured: model.is_featured,
            is_published: model.is_published,
            view_count: model.view_count,
            reviewer_id: model.reviewer_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
