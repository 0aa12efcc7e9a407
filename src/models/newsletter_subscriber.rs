use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "newsletter_subscribers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub name: Option<String>,
    pub is_active: bool,
    #[sea_orm(unique)]
    pub token: String,
    pub subscribed_at: String,
    pub unsubscribed_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberDto {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub subscribed_at: String,
    pub unsubscribed_at: Option<String>,
}

impl From<Model> for SubscriberDto {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            is_active: model.is_active,
            subscribed_at: model.subscribed_at,
            unsubscribed_at: model.unsubscribed_at,
        }
    }
}
