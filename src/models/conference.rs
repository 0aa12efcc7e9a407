use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::json_list;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conferences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub slug: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub abstract_deadline: Option<String>,
    pub registration_deadline: Option<String>,
    pub status: String,
    pub capacity: Option<i32>,
    pub registration_fee_cents: i64,
    pub tags: String, // JSON array
    pub is_featured: bool,
    pub banner_url: Option<String>,
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::conference_registration::Entity")]
    Registrations,
    #[sea_orm(has_many = "super::abstract_submission::Entity")]
    Abstracts,
}

impl Related<super::conference_registration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Registrations.def()
    }
}

impl Related<super::abstract_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Abstracts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceDto {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub abstract_deadline: Option<String>,
    pub registration_deadline: Option<String>,
    pub status: String,
    pub capacity: Option<i32>,
    pub registration_fee_cents: i64,
    pub tags: Vec<String>,
    pub is_featured: bool,
    pub banner_url: Option<String>,
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_count: Option<u64>,
}

impl From<Model> for ConferenceDto {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            slug: model.slug,
            description: model.description,
            venue: model.venue,
            city: model.city,
            country: model.country,
            start_date: model.start_date,
            end_date: model.end_date,
            abstract_deadline: model.abstract_deadline,
            registration_deadline: model.registration_deadline,
            status: model.status,
            capacity: model.capacity,
            registration_fee_cents: model.registration_fee_cents,
            tags: json_list(&model.tags),
            is_featured: model.is_featured,
            banner_url: model.banner_url,
            view_count: model.view_count,
            created_at: model.created_at,
            updated_at: model.updated_at,
            registration_count: None,
        }
    }
}
