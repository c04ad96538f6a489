// Dashboard and statistics aggregation

use serde::Serialize;

use crate::cache::CacheService;
use crate::chain::FaucetDispatcher;
use crate::db::Storage;
use crate::entity::faucet_metrics;
use crate::services::session::SessionService;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTotals {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_amount_distributed: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetricsData {
    pub date: String,
    pub total_requests: i64,
    pub successful_requests: i64,
    pub failed_requests: i64,
    pub total_amount_distributed: String,
    pub rate_limit_errors: i64,
    pub network_errors: i64,
}

impl From<faucet_metrics::Model> for DailyMetricsData {
    fn from(row: faucet_metrics::Model) -> Self {
        DailyMetricsData {
            date: row.date.to_string(),
            total_requests: row.total_requests,
            successful_requests: row.successful_requests,
            failed_requests: row.failed_requests,
            total_amount_distributed: row.total_amount_distributed.to_string(),
            rate_limit_errors: row.rate_limit_errors,
            network_errors: row.network_errors,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendHealth {
    pub backend: String,
    pub healthy: bool,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummary {
    pub ready: bool,
    pub wallet_configured: bool,
    pub faucet_address: Option<String>,
    pub balance: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSummary {
    pub global_window_count: u64,
    pub global_window_ttl_seconds: u64,
    pub rate_limit_hits: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub transactions: TransactionTotals,
    pub today: Option<DailyMetricsData>,
    pub last_days: Vec<DailyMetricsData>,
    pub cache: BackendHealth,
    pub database_degraded: bool,
    pub chain: ChainSummary,
    pub rate_limits: RateLimitSummary,
    pub active_admin_sessions: usize,
    pub uptime_seconds: u64,
}

/// Aggregate everything the admin dashboard shows
pub async fn dashboard(
    storage: &Storage,
    cache: &CacheService,
    dispatcher: &FaucetDispatcher,
    sessions: &SessionService,
    uptime_seconds: u64,
) -> DashboardData {
    let (tx_stats, total_amount) = storage.transaction_stats().await.unwrap_or_default();
    let today = storage
        .daily_metrics_for(chrono::Utc::now().date_naive())
        .await
        .ok()
        .flatten()
        .map(DailyMetricsData::from);
    let last_days = storage
        .list_daily_metrics(7)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(DailyMetricsData::from)
        .collect();

    let (cache_healthy, cache_latency) = cache.health_check().await;
    let global_window = cache.get_rate("global", "global").await;
    let rate_limit_hits = cache.get_metric("rate_limit_hits").await;
    let balance = match dispatcher.has_wallet() {
        true => dispatcher.wallet_balance().await.ok().map(|b| b.to_string()),
        false => None,
    };

    DashboardData {
        transactions: TransactionTotals {
            total: tx_stats.total,
            successful: tx_stats.successful,
            failed: tx_stats.failed,
            total_amount_distributed: total_amount.to_string(),
        },
        today,
        last_days,
        cache: BackendHealth {
            backend: cache.backend_name().to_string(),
            healthy: cache_healthy,
            latency_ms: cache_latency,
        },
        database_degraded: storage.is_degraded(),
        chain: ChainSummary {
            ready: dispatcher.is_ready(),
            wallet_configured: dispatcher.has_wallet(),
            faucet_address: dispatcher.faucet_address().map(str::to_string),
            balance,
        },
        rate_limits: RateLimitSummary {
            global_window_count: global_window.map(|hit| hit.count).unwrap_or(0),
            global_window_ttl_seconds: global_window.map(|hit| hit.ttl_seconds).unwrap_or(0),
            rate_limit_hits,
        },
        active_admin_sessions: sessions.active_sessions().await,
        uptime_seconds,
    }
}
