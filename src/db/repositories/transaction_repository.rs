// Transaction journal database operations

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::error::DbError;
use crate::entity::transactions;

/// Fields for a new journal row; the id and timestamp are assigned here
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub request_id: String,
    pub wallet_address: String,
    pub amount: u64,
    pub tx_hash: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub client_ip: String,
    pub user_agent: Option<String>,
}

/// Aggregate counts over the journal
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

/// Repository for transaction journal operations
#[derive(Clone)]
pub struct TransactionRepository {
    conn: DatabaseConnection,
}

impl TransactionRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        TransactionRepository { conn }
    }

    /// Append one journal row; rows are never mutated afterwards
    pub async fn save(&self, tx: NewTransaction) -> Result<(), DbError> {
        let row = transactions::ActiveModel {
            request_id: Set(tx.request_id),
            wallet_address: Set(tx.wallet_address),
            amount: Set(tx.amount.to_string()),
            tx_hash: Set(tx.tx_hash),
            status: Set(if tx.success { "success" } else { "failed" }.to_string()),
            error_message: Set(tx.error_message),
            client_ip: Set(tx.client_ip),
            user_agent: Set(tx.user_agent),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        row.insert(&self.conn).await?;
        Ok(())
    }

    /// Newest-first page of the journal plus the total row count
    pub async fn list(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<transactions::Model>, u64), DbError> {
        let total = transactions::Entity::find().count(&self.conn).await?;
        let rows = transactions::Entity::find()
            .order_by_desc(transactions::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(&self.conn)
            .await?;
        Ok((rows, total))
    }

    pub async fn list_by_wallet(
        &self,
        wallet_address: &str,
        limit: u64,
    ) -> Result<Vec<transactions::Model>, DbError> {
        transactions::Entity::find()
            .filter(transactions::Column::WalletAddress.eq(wallet_address))
            .order_by_desc(transactions::Column::CreatedAt)
            .limit(limit)
            .all(&self.conn)
            .await
            .map_err(Into::into)
    }

    pub async fn stats(&self) -> Result<TransactionStats, DbError> {
        let total = transactions::Entity::find().count(&self.conn).await?;
        let successful = transactions::Entity::find()
            .filter(transactions::Column::Status.eq("success"))
            .count(&self.conn)
            .await?;
        Ok(TransactionStats {
            total,
            successful,
            failed: total - successful,
        })
    }
}
