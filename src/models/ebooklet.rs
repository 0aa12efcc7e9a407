use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::json_list;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ebooklets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub authors: String, // JSON array
    pub category: String,
    pub tags: String, // JSON array
    pub cover_url: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
    pub is_featured: bool,
    pub is_published: bool,
    pub view_count: i64,
    pub download_count: i64,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EbookletDto {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub cover_url: Option<String>,
    pub file_url: Option<String>,
    pub file_size: Option<i64>,
    pub is_featured: bool,
    pub is_published: bool,
    pub view_count: i64,
    pub download_count: i64,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Model> for EbookletDto {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            authors: json_list(&model.authors),
            category: model.category,
            tags: json_list(&model.tags),
            cover_url: model.cover_url,
            file_url: model.file_url,
            file_size: model.file_size,
            is_featured: model.is_featured,
            is_published: model.is_published,
            view_count: model.view_count,
            download_count: model.download_count,
            published_at: model.published_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
