// Cache / rate store
// Two interchangeable backends (remote redis, process-local map) behind one
// capability set. The service wrapper owns key prefixes and the fallback
// discipline: remote errors surface as fail-open sentinels, five
// consecutive failures switch the service to the in-memory backend, and a
// background probe keeps trying the remote side until it answers.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// How many consecutive remote failures force the in-memory backend
const FAILURE_THRESHOLD: u32 = 5;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache protocol error: {0}")]
    Protocol(String),
}

impl From<::redis::RedisError> for CacheError {
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_io_error() || err.is_timeout() {
            CacheError::Unavailable(err.to_string())
        } else {
            CacheError::Protocol(err.to_string())
        }
    }
}

/// Result of a rate-counter read or increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterHit {
    pub count: u64,
    pub ttl_seconds: u64,
}

/// Capability set shared by both backends
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Atomic increment; the expiry window is set on the first hit
    async fn incr(&self, key: &str, window_ms: u64) -> Result<CounterHit, CacheError>;
    /// Current count and remaining ttl, if the key exists
    async fn get_count(&self, key: &str) -> Result<Option<CounterHit>, CacheError>;
    async fn reset(&self, key: &str) -> Result<(), CacheError>;
    /// Unexpiring named counter (daily metrics mirror)
    async fn add_counter(&self, key: &str, delta: i64) -> Result<i64, CacheError>;
    async fn get_counter(&self, key: &str) -> Result<i64, CacheError>;
    async fn set_kv(&self, key: &str, value: &str, ttl_seconds: Option<u64>)
        -> Result<(), CacheError>;
    async fn get_kv(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn delete_kv(&self, key: &str) -> Result<(), CacheError>;
    /// Remove every key under the given prefix; returns how many were dropped
    async fn flush_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Cache service owning backend selection, prefixes and fallback
pub struct CacheService {
    prefix: String,
    cache_url: Option<String>,
    remote: RwLock<Option<RedisStore>>,
    memory: MemoryStore,
    consecutive_failures: AtomicU32,
    degraded: AtomicBool,
    closed: AtomicBool,
}

impl CacheService {
    /// Connect the remote backend when a cache url is configured; otherwise
    /// run purely in memory. A remote that is down at startup keeps being
    /// retried by the background probe.
    pub async fn new(cache_url: Option<&str>, prefix: &str) -> Self {
        let remote = match cache_url {
            Some(url) => match RedisStore::connect(url).await {
                Ok(store) => {
                    tracing::info!("Connected to cache backend");
                    Some(store)
                }
                Err(e) => {
                    tracing::warn!("Cache backend unreachable, starting in-memory: {}", e);
                    None
                }
            },
            None => {
                tracing::info!("No CACHE_URL configured, using in-memory cache");
                None
            }
        };

        CacheService {
            prefix: prefix.to_string(),
            // Degraded means "remote configured but in fallback"; a purely
            // in-memory deployment is healthy, not degraded
            degraded: AtomicBool::new(cache_url.is_some() && remote.is_none()),
            cache_url: cache_url.map(str::to_string),
            remote: RwLock::new(remote),
            memory: MemoryStore::new(),
            consecutive_failures: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// The remote store, when configured and not in fallback
    async fn remote_store(&self) -> Option<RedisStore> {
        if self.degraded.load(Ordering::Relaxed) {
            return None;
        }
        self.remote.read().await.clone()
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self, op: &str, err: &CacheError) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(operation = op, failures, "Cache operation failed: {}", err);
        if failures >= FAILURE_THRESHOLD && !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "Cache backend unreachable {} times in a row, switching to in-memory store",
                failures
            );
        }
    }

    /// Re-check the remote backend and switch back when it answers.
    /// Driven by a background interval task.
    pub async fn probe_remote(&self) {
        let Some(url) = &self.cache_url else { return };
        if self.closed.load(Ordering::Relaxed) {
            return;
        }

        let missing = self.remote.read().await.is_none();
        if missing {
            if let Ok(store) = RedisStore::connect(url).await {
                *self.remote.write().await = Some(store);
                self.consecutive_failures.store(0, Ordering::Relaxed);
                self.degraded.store(false, Ordering::Relaxed);
                tracing::info!("Cache backend connected, leaving in-memory mode");
            }
            return;
        }

        if !self.degraded.load(Ordering::Relaxed) {
            return;
        }
        let healthy = match self.remote.read().await.as_ref() {
            Some(remote) => remote.ping().await.is_ok(),
            None => false,
        };
        if healthy {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            self.degraded.store(false, Ordering::Relaxed);
            tracing::info!("Cache backend reachable again, leaving in-memory mode");
        }
    }

    /// Evict expired entries from the in-memory backend
    pub async fn sweep_memory(&self) {
        self.memory.sweep().await;
    }

    // ---- keyspace ----

    fn rate_key(&self, dimension: &str, id: &str) -> String {
        format!("{}rate_limit:{}:{}", self.prefix, dimension, id)
    }

    fn wallet_key(&self, address: &str) -> String {
        format!("{}wallets:{}", self.prefix, address)
    }

    fn metrics_key(&self, name: &str) -> String {
        format!("{}metrics:{}", self.prefix, name)
    }

    // ---- rate counters ----

    /// Increment a rate counter. Never errors: a failing remote yields the
    /// fail-open sentinel (count 1, full window) so admission lets the
    /// affected dimension pass.
    pub async fn incr_rate(&self, dimension: &str, id: &str, window_ms: u64) -> CounterHit {
        let key = self.rate_key(dimension, id);
        let sentinel = CounterHit { count: 1, ttl_seconds: window_ms / 1000 };
        match self.remote_store().await {
            Some(remote) => match remote.incr(&key, window_ms).await {
                Ok(hit) => {
                    self.record_success();
                    hit
                }
                Err(e) => {
                    self.record_failure("incr", &e);
                    sentinel
                }
            },
            None => self.memory.incr(&key, window_ms).await.unwrap_or(sentinel),
        }
    }

    pub async fn get_rate(&self, dimension: &str, id: &str) -> Option<CounterHit> {
        let key = self.rate_key(dimension, id);
        match self.remote_store().await {
            Some(remote) => match remote.get_count(&key).await {
                Ok(hit) => {
                    self.record_success();
                    hit
                }
                Err(e) => {
                    self.record_failure("get", &e);
                    None
                }
            },
            None => self.memory.get_count(&key).await.unwrap_or(None),
        }
    }

    // ---- metrics counters ----

    pub async fn add_metric(&self, name: &str, delta: i64) {
        let key = self.metrics_key(name);
        match self.remote_store().await {
            Some(remote) => match remote.add_counter(&key, delta).await {
                Ok(_) => self.record_success(),
                Err(e) => self.record_failure("add_counter", &e),
            },
            None => {
                let _ = self.memory.add_counter(&key, delta).await;
            }
        }
    }

    pub async fn get_metric(&self, name: &str) -> i64 {
        let key = self.metrics_key(name);
        match self.remote_store().await {
            Some(remote) => match remote.get_counter(&key).await {
                Ok(value) => {
                    self.record_success();
                    value
                }
                Err(e) => {
                    self.record_failure("get_counter", &e);
                    0
                }
            },
            None => self.memory.get_counter(&key).await.unwrap_or(0),
        }
    }

    // ---- wallet last-request tracking ----

    /// Record the last successful dispatch for a wallet; expires with the
    /// given ttl so stale markers cannot outlive their cooldown
    pub async fn track_last_request(&self, address: &str, ts_ms: u64, ttl_ms: u64) {
        let key = self.wallet_key(address);
        let value = ts_ms.to_string();
        let ttl = Some(ttl_ms / 1000);
        match self.remote_store().await {
            Some(remote) => match remote.set_kv(&key, &value, ttl).await {
                Ok(()) => self.record_success(),
                Err(e) => self.record_failure("track_last_request", &e),
            },
            None => {
                let _ = self.memory.set_kv(&key, &value, ttl).await;
            }
        }
    }

    pub async fn get_last_request(&self, address: &str) -> Option<u64> {
        let key = self.wallet_key(address);
        let raw = match self.remote_store().await {
            Some(remote) => match remote.get_kv(&key).await {
                Ok(value) => {
                    self.record_success();
                    value
                }
                Err(e) => {
                    self.record_failure("get_last_request", &e);
                    None
                }
            },
            None => self.memory.get_kv(&key).await.unwrap_or(None),
        };
        raw.and_then(|v| v.parse::<u64>().ok())
    }

    /// Drop every key this service owns
    pub async fn flush(&self) -> u64 {
        match self.remote_store().await {
            Some(remote) => match remote.flush_prefix(&self.prefix).await {
                Ok(dropped) => {
                    self.record_success();
                    dropped
                }
                Err(e) => {
                    self.record_failure("flush", &e);
                    0
                }
            },
            None => self.memory.flush_prefix(&self.prefix).await.unwrap_or(0),
        }
    }

    /// Backend health with round-trip latency
    pub async fn health_check(&self) -> (bool, u64) {
        let started = Instant::now();
        let healthy = match self.remote_store().await {
            Some(remote) => remote.ping().await.is_ok(),
            None => self.memory.ping().await.is_ok(),
        };
        (healthy, started.elapsed().as_millis() as u64)
    }

    /// Drop the remote connection at shutdown; the in-memory map dies with
    /// the process. The probe will not reconnect after this.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        if self.remote.write().await.take().is_some() {
            tracing::info!("Cache connection closed");
        }
    }

    /// Whether the service is currently running on the in-memory backend
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn backend_name(&self) -> &'static str {
        if self.cache_url.is_some() && !self.is_degraded() {
            "redis"
        } else {
            "memory"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_service_counts_per_dimension() {
        let cache = CacheService::new(None, "suifx:").await;
        let first = cache.incr_rate("wallet", "0xabc", 60_000).await;
        let second = cache.incr_rate("wallet", "0xabc", 60_000).await;
        let other = cache.incr_rate("ip", "0xabc", 60_000).await;
        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert_eq!(other.count, 1);
        assert!(second.ttl_seconds <= 60);
    }

    #[tokio::test]
    async fn last_request_round_trip() {
        let cache = CacheService::new(None, "suifx:").await;
        assert_eq!(cache.get_last_request("0xabc").await, None);
        cache.track_last_request("0xabc", 1_700_000_000_000, 3_600_000).await;
        assert_eq!(cache.get_last_request("0xabc").await, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn metrics_counters_accumulate() {
        let cache = CacheService::new(None, "suifx:").await;
        cache.add_metric("requests_total", 1).await;
        cache.add_metric("requests_total", 2).await;
        assert_eq!(cache.get_metric("requests_total").await, 3);
        assert_eq!(cache.get_metric("requests_success").await, 0);
    }

    #[tokio::test]
    async fn flush_drops_all_keys() {
        let cache = CacheService::new(None, "suifx:").await;
        cache.incr_rate("global", "global", 60_000).await;
        cache.track_last_request("0xabc", 1_700_000_000_000, 60_000).await;
        assert!(cache.flush().await >= 2);
        assert_eq!(cache.get_rate("global", "global").await, None);
        assert_eq!(cache.get_last_request("0xabc").await, None);
    }

    #[tokio::test]
    async fn memory_backend_reports_healthy() {
        let cache = CacheService::new(None, "suifx:").await;
        let (healthy, _latency) = cache.health_check().await;
        assert!(healthy);
        assert_eq!(cache.backend_name(), "memory");
        assert!(!cache.is_degraded());
    }
}
