use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::error::Result;

/// Counts failed logins per key inside a sliding TTL window.
#[async_trait]
pub trait LoginAttemptStore: Send + Sync {
    /// Returns the failure count and the seconds left in the window.
    async fn attempts(&self, key: &str) -> Result<Option<(u32, u64)>>;

    /// Records one failure and (re)starts the window.
    async fn record_failure(&self, key: &str, window_secs: u64) -> Result<()>;

    /// Forgets all failures for `key`.
    async fn reset(&self, key: &str) -> Result<()>;
}

/// Redis-backed [`LoginAttemptStore`].
#[derive(Clone)]
pub struct RedisLoginAttemptStore {
    redis: ConnectionManager,
}

impl RedisLoginAttemptStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl LoginAttemptStore for RedisLoginAttemptStore {
    async fn attempts(&self, key: &str) -> Result<Option<(u32, u64)>> {
        let count: Option<u32> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.redis.clone())
            .await?;

        let Some(count) = count else {
            return Ok(None);
        };

        let ttl: i64 = redis::cmd("TTL")
            .arg(key)
            .query_async(&mut self.redis.clone())
            .await?;

        Ok(Some((count, ttl.max(0) as u64)))
    }

    async fn record_failure(&self, key: &str, window_secs: u64) -> Result<()> {
        let _: () = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .ignore()
            .query_async(&mut self.redis.clone())
            .await?;
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut self.redis.clone())
            .await?;
        Ok(())
    }
}
