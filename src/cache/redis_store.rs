// Remote cache backend over redis
// Uses a ConnectionManager so reconnection happens in the background; every
// operation here can still fail fast while the link is down, which the
// service wrapper turns into sentinels.

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::{CacheError, CacheStore, CounterHit};

#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::from)?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(CacheError::from)?;
        Ok(RedisStore { manager })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn incr(&self, key: &str, window_ms: u64) -> Result<CounterHit, CacheError> {
        let mut conn = self.manager.clone();
        let window_secs = (window_ms / 1000).max(1);

        let count: u64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        if count == 1 {
            let _: i64 = redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await?;
        }
        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;

        Ok(CounterHit {
            count,
            // TTL is -1 for keys without expiry and -2 for missing keys;
            // report the full window rather than a nonsense value
            ttl_seconds: if ttl > 0 { ttl as u64 } else { window_secs },
        })
    }

    async fn get_count(&self, key: &str) -> Result<Option<CounterHit>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<u64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        match value {
            Some(count) => {
                let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
                Ok(Some(CounterHit { count, ttl_seconds: ttl.max(0) as u64 }))
            }
            None => Ok(None),
        }
    }

    async fn reset(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn add_counter(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let mut conn = self.manager.clone();
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn get_counter(&self, key: &str) -> Result<i64, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<i64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value.unwrap_or(0))
    }

    async fn set_kv(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        match ttl_seconds.filter(|ttl| *ttl > 0) {
            Some(ttl) => {
                let _: String = redis::cmd("SETEX")
                    .arg(key)
                    .arg(ttl)
                    .arg(value)
                    .query_async(&mut conn)
                    .await?;
            }
            None => {
                let _: String = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .query_async(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    async fn get_kv(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete_kv(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn flush_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut dropped: u64 = 0;
        let pattern = format!("{}*", prefix);
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let mut del = redis::cmd("DEL");
                for key in &keys {
                    del.arg(key);
                }
                let removed: u64 = del.query_async(&mut conn).await?;
                dropped += removed;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(dropped)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
