use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Dynamic rate-limit settings, seeded at bootstrap and mutated by admins
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "rate_limit_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub setting_name: String,
    pub setting_value: String,
    /// "number", "boolean" or "string"
    pub value_type: String,
    pub is_active: bool,
    pub updated_by: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
