use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[sea_orm(string_value = "rings")]
    Rings,
    #[sea_orm(string_value = "necklaces")]
    Necklaces,
    #[sea_orm(string_value = "earrings")]
    Earrings,
    #[sea_orm(string_value = "bracelets")]
    Bracelets,
    #[sea_orm(string_value = "watches")]
    Watches,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub in_stock: bool,
    pub count_in_stock: i32,
    pub image: String,
    pub description: String,
    pub category: Category,
    pub rating: f64,
    pub num_reviews: i32,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
