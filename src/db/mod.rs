// Persistence store
// One interface over two interchangeable backends (remote postgres, embedded
// sqlite file) selected by the DB_URL scheme. When no backend is configured
// or the connection fails permanently, the store runs degraded: writes are
// accepted as no-ops, reads return empty results, and the faucet keeps
// dispensing.

mod pool;
pub mod repositories;

pub use pool::DbPool;

pub use crate::error::DbError;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

use crate::entity::{admin_activities, admin_users, api_clients, faucet_metrics, transactions};
use repositories::{
    MetricsDelta, NewApiClient, NewTransaction, Repositories, TransactionStats,
};

/// Durable store façade handed to every component
#[derive(Clone)]
pub struct Storage {
    conn: Option<DatabaseConnection>,
    repos: Option<Repositories>,
    /// Set during shutdown: in-flight writes finish, new writes are rejected
    draining: Arc<AtomicBool>,
}

impl Storage {
    /// Connect and bootstrap the configured backend; any failure yields a
    /// degraded store with a single warning
    pub async fn connect(db_url: Option<&str>) -> Storage {
        let Some(url) = db_url else {
            tracing::warn!("No DB_URL configured, persistence disabled (degraded mode)");
            return Storage::disabled();
        };

        match DbPool::new(url).await {
            Ok(db_pool) => match db_pool.bootstrap_schema().await {
                Ok(()) => {
                    tracing::info!("Connected to database");
                    Storage {
                        conn: Some(db_pool.get_connection().clone()),
                        repos: Some(db_pool.repositories()),
                        draining: Arc::new(AtomicBool::new(false)),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Database schema bootstrap failed, persistence disabled (degraded mode): {}",
                        e
                    );
                    Storage::disabled()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Database connection failed, persistence disabled (degraded mode): {}",
                    e
                );
                Storage::disabled()
            }
        }
    }

    /// A store with no backend, for tests and degraded paths
    pub fn disabled() -> Storage {
        Storage { conn: None, repos: None, draining: Arc::new(AtomicBool::new(false)) }
    }

    pub fn is_degraded(&self) -> bool {
        self.repos.is_none()
    }

    /// Stop accepting new writes; reads and in-flight writes are unaffected
    pub fn begin_drain(&self) {
        if !self.draining.swap(true, Ordering::Relaxed) {
            tracing::info!("Persistence draining, new writes rejected");
        }
    }

    /// Close the underlying connection pool once the drain is over
    pub async fn close(&self) {
        let Some(conn) = self.conn.clone() else { return };
        if let Err(e) = conn.close().await {
            tracing::warn!("Failed to close database pool: {}", e);
        } else {
            tracing::info!("Database pool closed");
        }
    }

    fn accepting_writes(&self) -> Result<(), DbError> {
        if self.draining.load(Ordering::Relaxed) {
            return Err(DbError::ConnectionError(
                "store is draining, new writes rejected".to_string(),
            ));
        }
        Ok(())
    }

    // ---- transactions ----

    pub async fn save_transaction(&self, tx: NewTransaction) -> Result<(), DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => repos.transactions.save(tx).await,
            None => Ok(()),
        }
    }

    pub async fn list_transactions(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<transactions::Model>, u64), DbError> {
        match &self.repos {
            Some(repos) => repos.transactions.list(limit, offset).await,
            None => Ok((Vec::new(), 0)),
        }
    }

    pub async fn list_transactions_by_wallet(
        &self,
        wallet_address: &str,
        limit: u64,
    ) -> Result<Vec<transactions::Model>, DbError> {
        match &self.repos {
            Some(repos) => repos.transactions.list_by_wallet(wallet_address, limit).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn transaction_stats(&self) -> Result<(TransactionStats, i64), DbError> {
        match &self.repos {
            Some(repos) => {
                let stats = repos.transactions.stats().await?;
                let total_amount = repos.metrics.total_distributed().await?;
                Ok((stats, total_amount))
            }
            None => Ok((TransactionStats::default(), 0)),
        }
    }

    // ---- daily metrics ----

    pub async fn upsert_daily_metrics(
        &self,
        date: NaiveDate,
        delta: MetricsDelta,
    ) -> Result<(), DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => repos.metrics.upsert(date, delta).await,
            None => Ok(()),
        }
    }

    pub async fn list_daily_metrics(
        &self,
        days: u32,
    ) -> Result<Vec<faucet_metrics::Model>, DbError> {
        match &self.repos {
            Some(repos) => repos.metrics.list_recent(days).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn daily_metrics_for(
        &self,
        date: NaiveDate,
    ) -> Result<Option<faucet_metrics::Model>, DbError> {
        match &self.repos {
            Some(repos) => repos.metrics.get_by_date(date).await,
            None => Ok(None),
        }
    }

    // ---- api clients ----

    pub async fn create_api_client(
        &self,
        client: NewApiClient,
    ) -> Result<api_clients::Model, DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => repos.clients.create(client).await,
            // Degraded: accept the write and echo the generated credentials
            None => Ok(api_clients::Model {
                id: 0,
                client_id: client.client_id,
                api_key: client.api_key,
                client_secret: client.client_secret,
                name: client.name,
                description: client.description,
                homepage_url: client.homepage_url,
                callback_url: client.callback_url,
                is_active: true,
                rate_limit_override: None,
                usage_count: 0,
                last_used_at: None,
                created_at: chrono::Utc::now(),
            }),
        }
    }

    pub async fn find_api_client_by_key(
        &self,
        api_key: &str,
    ) -> Result<Option<api_clients::Model>, DbError> {
        match &self.repos {
            Some(repos) => repos.clients.find_by_api_key(api_key).await,
            None => Ok(None),
        }
    }

    pub async fn find_api_client_by_id(
        &self,
        client_id: &str,
    ) -> Result<Option<api_clients::Model>, DbError> {
        match &self.repos {
            Some(repos) => repos.clients.find_by_client_id(client_id).await,
            None => Ok(None),
        }
    }

    pub async fn list_api_clients(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<api_clients::Model>, u64), DbError> {
        match &self.repos {
            Some(repos) => repos.clients.list(limit, offset).await,
            None => Ok((Vec::new(), 0)),
        }
    }

    pub async fn deactivate_api_client(&self, client_id: &str) -> Result<bool, DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => repos.clients.deactivate(client_id).await,
            None => Ok(false),
        }
    }

    pub async fn set_api_key(
        &self,
        client_id: &str,
        new_key: &str,
    ) -> Result<Option<api_clients::Model>, DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => repos.clients.set_api_key(client_id, new_key).await,
            None => Ok(None),
        }
    }

    pub async fn record_client_usage(
        &self,
        client_id: &str,
        endpoint: &str,
        method: &str,
        response_status: i32,
        response_time_ms: i64,
    ) -> Result<(), DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => {
                repos
                    .clients
                    .record_usage(client_id, endpoint, method, response_status, response_time_ms)
                    .await
            }
            None => Ok(()),
        }
    }

    // ---- admin users + audit ----

    pub async fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(), DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => repos.admins.ensure_bootstrap_admin(username, password_hash).await,
            None => Ok(()),
        }
    }

    pub async fn authenticate_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<admin_users::Model>, DbError> {
        match &self.repos {
            Some(repos) => repos.admins.authenticate(username, password).await,
            None => Ok(None),
        }
    }

    pub async fn save_admin_activity(
        &self,
        admin_username: &str,
        action: &str,
        details: Option<String>,
        client_ip: &str,
    ) -> Result<(), DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => {
                repos
                    .admins
                    .save_activity(admin_username, action, details, client_ip)
                    .await
            }
            None => Ok(()),
        }
    }

    pub async fn list_admin_activities(
        &self,
        limit: u64,
    ) -> Result<Vec<admin_activities::Model>, DbError> {
        match &self.repos {
            Some(repos) => repos.admins.list_activities(limit).await,
            None => Ok(Vec::new()),
        }
    }

    // ---- settings ----

    pub async fn list_settings(
        &self,
    ) -> Result<Vec<crate::entity::rate_limit_settings::Model>, DbError> {
        match &self.repos {
            Some(repos) => repos.settings.all().await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn update_setting(
        &self,
        name: &str,
        value: &str,
        actor: &str,
    ) -> Result<Option<crate::entity::rate_limit_settings::Model>, DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => repos.settings.update_value(name, value, actor).await,
            None => Ok(None),
        }
    }

    pub async fn seed_settings(&self, defaults: &[(&str, &str, &str)]) -> Result<(), DbError> {
        self.accepting_writes()?;
        match &self.repos {
            Some(repos) => repos.settings.seed(defaults).await,
            None => Ok(()),
        }
    }

    /// Round-trip health probe against the live backend
    pub async fn health_check(&self) -> (bool, u64) {
        let started = std::time::Instant::now();
        let healthy = match &self.repos {
            Some(repos) => repos.settings.all().await.is_ok(),
            None => false,
        };
        (healthy, started.elapsed().as_millis() as u64)
    }
}
