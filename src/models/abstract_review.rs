use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "abstract_reviews")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub abstract_id: i32,
    pub reviewer_id: i32,
    pub score: i32,
    pub recommendation: String,
    pub comments: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::abstract_submission::Entity",
        from = "Column::AbstractId",
        to = "super::abstract_submission::Column::Id",
        on_delete = "Cascade"
    )]
    Abstract,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReviewerId",
        to = "super::user::Column::Id"
    )]
    Reviewer,
}

impl Related<super::abstract_submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Abstract.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviewer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDto {
    pub id: i32,
    pub abstract_id: i32,
    pub reviewer_id: i32,
    pub score: i32,
    pub recommendation: String,
    pub comments: Option<String>,
    pub created_at: String,
}

impl From<Model> for ReviewDto {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            abstract_id: model.abstract_id,
            reviewer_id: model.reviewer_id,
            score: model.score,
            recommendation: model.recommendation,
            comments: model.comments,
            created_at: model.created_at,
        }
    }
}
