// Process-local cache backend
// Entries are checked for expiry lazily on access and reaped by a periodic
// sweeper task when nothing touches them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheError, CacheStore, CounterHit};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at <= Instant::now())
    }

    fn ttl_seconds(&self) -> u64 {
        match self.expires_at {
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                // Round up so a counter one tick from expiry still reports 1s
                remaining.as_millis().div_ceil(1000) as u64
            }
            None => 0,
        }
    }
}

/// Concurrent map of { value, expires_at }
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore { entries: RwLock::new(HashMap::new()) }
    }

    /// Evict every expired entry
    pub async fn sweep(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.expired());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn incr(&self, key: &str, window_ms: u64) -> Result<CounterHit, CacheError> {
        let mut entries = self.entries.write().await;
        let entry = entries.get(key).filter(|e| !e.expired());
        let hit = match entry {
            Some(existing) => {
                let count = existing.value.parse::<u64>().unwrap_or(0) + 1;
                let updated = Entry {
                    value: count.to_string(),
                    expires_at: existing.expires_at,
                };
                let ttl = updated.ttl_seconds();
                entries.insert(key.to_string(), updated);
                CounterHit { count, ttl_seconds: ttl }
            }
            None => {
                let created = Entry {
                    value: "1".to_string(),
                    expires_at: Some(Instant::now() + Duration::from_millis(window_ms)),
                };
                let ttl = created.ttl_seconds();
                entries.insert(key.to_string(), created);
                CounterHit { count: 1, ttl_seconds: ttl }
            }
        };
        Ok(hit)
    }

    async fn get_count(&self, key: &str) -> Result<Option<CounterHit>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).filter(|e| !e.expired()).map(|entry| CounterHit {
            count: entry.value.parse::<u64>().unwrap_or(0),
            ttl_seconds: entry.ttl_seconds(),
        }))
    }

    async fn reset(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn add_counter(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let mut entries = self.entries.write().await;
        let current = entries
            .get(key)
            .filter(|e| !e.expired())
            .and_then(|e| e.value.parse::<i64>().ok())
            .unwrap_or(0);
        let updated = current + delta;
        entries.insert(
            key.to_string(),
            Entry { value: updated.to_string(), expires_at: None },
        );
        Ok(updated)
    }

    async fn get_counter(&self, key: &str) -> Result<i64, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.expired())
            .and_then(|e| e.value.parse::<i64>().ok())
            .unwrap_or(0))
    }

    async fn set_kv(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CacheError> {
        let expires_at = ttl_seconds
            .filter(|ttl| *ttl > 0)
            .map(|ttl| Instant::now() + Duration::from_secs(ttl));
        self.entries.write().await.insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at },
        );
        Ok(())
    }

    async fn get_kv(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.expired())
            .map(|e| e.value.clone()))
    }

    async fn delete_kv(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn flush_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_sets_window_on_first_hit_only() {
        let store = MemoryStore::new();
        let first = store.incr("k", 10_000).await.unwrap();
        assert_eq!(first.count, 1);
        assert!(first.ttl_seconds >= 9 && first.ttl_seconds <= 10);

        let second = store.incr("k", 99_000).await.unwrap();
        assert_eq!(second.count, 2);
        // window from the first hit, not re-armed
        assert!(second.ttl_seconds <= 10);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = MemoryStore::new();
        store.incr("k", 1).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get_count("k").await.unwrap(), None);

        // a fresh incr restarts at 1
        let hit = store.incr("k", 10_000).await.unwrap();
        assert_eq!(hit.count, 1);
    }

    #[tokio::test]
    async fn sweep_removes_expired_entries() {
        let store = MemoryStore::new();
        store.set_kv("a", "1", Some(0)).await.unwrap();
        store.incr("b", 1).await.unwrap();
        store.set_kv("c", "keep", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.sweep().await;
        let entries = store.entries.read().await;
        assert!(entries.contains_key("a")); // no ttl requested, ttl=0 means no expiry
        assert!(!entries.contains_key("b"));
        assert!(entries.contains_key("c"));
    }

    #[tokio::test]
    async fn kv_set_get_delete() {
        let store = MemoryStore::new();
        store.set_kv("k", "v", Some(1)).await.unwrap();
        assert_eq!(store.get_kv("k").await.unwrap(), Some("v".to_string()));
        store.delete_kv("k").await.unwrap();
        assert_eq!(store.get_kv("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn reset_clears_counter() {
        let store = MemoryStore::new();
        store.incr("k", 10_000).await.unwrap();
        store.reset("k").await.unwrap();
        assert_eq!(store.get_count("k").await.unwrap(), None);
    }
}
