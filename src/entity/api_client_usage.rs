use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-request usage rows for authenticated API clients
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "api_client_usage")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub client_id: String,
    pub endpoint: String,
    pub method: String,
    pub response_status: i32,
    pub response_time_ms: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
