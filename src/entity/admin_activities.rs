use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit log of admin actions
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub admin_username: String,
    pub action: String,
    pub details: Option<String>,
    pub client_ip: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
