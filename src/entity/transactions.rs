use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Journal of every dispatch outcome; rows are written once and never mutated
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub request_id: String,
    pub wallet_address: String,
    /// Base units, kept as a string to preserve precision
    pub amount: String,
    pub tx_hash: Option<String>,
    /// "success" or "failed"
    pub status: String,
    pub error_message: Option<String>,
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
