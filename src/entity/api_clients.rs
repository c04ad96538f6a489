use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Registered third-party API clients
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "api_clients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub client_id: String,
    #[sea_orm(unique)]
    pub api_key: String,
    /// Stored but never returned after creation
    pub client_secret: String,
    pub name: String,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub callback_url: Option<String>,
    pub is_active: bool,
    pub rate_limit_override: Option<i32>,
    pub usage_count: i64,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
