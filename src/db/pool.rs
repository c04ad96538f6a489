// Database connection pooling and schema bootstrap
// The backend (remote postgres or embedded sqlite file) is chosen purely by
// the DB_URL scheme; callers never learn which one is live.

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;

use crate::error::DbError;
use crate::db::repositories::Repositories;
use crate::entity::{
    admin_activities, admin_users, api_client_usage, api_clients, faucet_metrics,
    rate_limit_settings, transactions,
};

/// Database connection pool for managing Sea-ORM connections
pub struct DbPool {
    pool: DatabaseConnection,
}

impl DbPool {
    /// Creates a new database connection pool for the given url
    pub async fn new(db_url: &str) -> Result<Self, DbError> {
        let max_connections = 10;
        let min_connections = 1;
        let connect_timeout = 10;
        let idle_timeout = 30;
        let acquire_timeout = 5; // Fail fast instead of waiting 10s
        let max_lifetime = 300;
        let debug_mode = false;

        let conn_opts = ConnectOptions::new(db_url.to_string())
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(connect_timeout))
            .idle_timeout(Duration::from_secs(idle_timeout))
            .acquire_timeout(Duration::from_secs(acquire_timeout))
            .max_lifetime(Duration::from_secs(max_lifetime))
            .sqlx_logging(debug_mode)
            .to_owned();

        Database::connect(conn_opts)
            .await
            .map(|pool| DbPool { pool })
            .map_err(|e| DbError::ConnectionError(e.to_string()))
    }

    /// Create every table and index if absent; both backends bootstrap their
    /// own schema on first connection
    pub async fn bootstrap_schema(&self) -> Result<(), DbError> {
        let backend = self.pool.get_database_backend();
        let schema = Schema::new(backend);

        let mut statements = vec![
            schema.create_table_from_entity(transactions::Entity),
            schema.create_table_from_entity(faucet_metrics::Entity),
            schema.create_table_from_entity(api_clients::Entity),
            schema.create_table_from_entity(api_client_usage::Entity),
            schema.create_table_from_entity(admin_users::Entity),
            schema.create_table_from_entity(admin_activities::Entity),
            schema.create_table_from_entity(rate_limit_settings::Entity),
        ];
        for statement in &mut statements {
            statement.if_not_exists();
            self.pool.execute(backend.build(&*statement)).await?;
        }

        use sea_orm::sea_query::Index;
        use sea_orm::EntityName;

        let indices = [
            Index::create()
                .name("idx_transactions_wallet_address")
                .table(transactions::Entity.table_ref())
                .col(transactions::Column::WalletAddress)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_transactions_created_at")
                .table(transactions::Entity.table_ref())
                .col(transactions::Column::CreatedAt)
                .if_not_exists()
                .to_owned(),
            Index::create()
                .name("idx_api_client_usage_client_id")
                .table(api_client_usage::Entity.table_ref())
                .col(api_client_usage::Column::ClientId)
                .if_not_exists()
                .to_owned(),
        ];
        for index in &indices {
            self.pool.execute(backend.build(index)).await?;
        }

        Ok(())
    }

    /// Returns a reference to the underlying database connection
    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.pool
    }

    /// Creates repository instances for database operations
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone())
    }
}
