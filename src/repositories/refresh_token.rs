//! Refresh-token persistence.
//!
//! Records live under `refresh_token:{token}` with a Redis TTL, so they expire
//! even if nobody ever deletes them. A set under `refresh_token:user:{id}`
//! indexes the tokens of each user for bulk revocation. Every multi-key change
//! runs as a Lua script and is therefore atomic. Scripts only touch keys passed
//! in `KEYS`. A token key and its user index do not share a hash slot, so the
//! store expects a standalone Redis rather than a cluster.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::refresh_token::RefreshToken,
};

const TOKEN_PREFIX: &str = "refresh_token:";
const USER_INDEX_PREFIX: &str = "refresh_token:user:";

/// Durable mapping from refresh-token string to owning user, with expiry.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Inserts a record that the store drops on its own after `ttl_secs`.
    async fn store(&self, record: &RefreshToken, ttl_secs: i64) -> Result<()>;

    /// Returns the record, or `None` if absent or passively expired.
    async fn lookup(&self, token: &str) -> Result<Option<RefreshToken>>;

    /// Removes a record. Deleting an unknown token is a no-op.
    async fn delete(&self, token: &str) -> Result<()>;

    /// Removes every record of a user and returns how many were removed.
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<usize>;

    /// Atomically replaces `old_token` with `replacement`.
    ///
    /// Nothing is written unless `old_token` still exists at the moment of the
    /// call, so of several concurrent rotations of the same token at most one
    /// returns `true`.
    async fn rotate(&self, old_token: &str, replacement: &RefreshToken, ttl_secs: i64)
        -> Result<bool>;
}

fn token_key(token: &str) -> String {
    format!("{}{}", TOKEN_PREFIX, token)
}

fn user_index_key(user_id: Uuid) -> String {
    format!("{}{}", USER_INDEX_PREFIX, user_id)
}

fn to_json(record: &RefreshToken) -> Result<String> {
    sonic_rs::to_string(record)
        .map_err(|e| AppError::Internal(format!("Refresh token serialization failed: {}", e)))
}

fn from_json(json: &str) -> Result<RefreshToken> {
    sonic_rs::from_str(json)
        .map_err(|e| AppError::Internal(format!("Corrupt refresh token record: {}", e)))
}

// KEYS[1] token key, KEYS[2] user index. ARGV[1] token, ARGV[2] json, ARGV[3] ttl.
const STORE_SCRIPT: &str = r#"
redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
redis.call('SADD', KEYS[2], ARGV[1])
if redis.call('TTL', KEYS[2]) < tonumber(ARGV[3]) then
    redis.call('EXPIRE', KEYS[2], ARGV[3])
end
return 1
"#;

// KEYS[1] token key, KEYS[2] user index. ARGV[1] token, ARGV[2] expected json.
const DELETE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) ~= ARGV[2] then
    return 0
end
redis.call('DEL', KEYS[1])
redis.call('SREM', KEYS[2], ARGV[1])
return 1
"#;

// KEYS[1] user index, KEYS[2..] token keys. ARGV[1..] tokens, in KEYS order.
// Returns {removed, tokens still indexed}.
const DELETE_ALL_SCRIPT: &str = r#"
local removed = 0
for i = 2, #KEYS do
    removed = removed + redis.call('DEL', KEYS[i])
    redis.call('SREM', KEYS[1], ARGV[i - 1])
end
local remaining = redis.call('SCARD', KEYS[1])
if remaining == 0 then
    redis.call('DEL', KEYS[1])
end
return {removed, remaining}
"#;

// KEYS[1] old token key, KEYS[2] user index, KEYS[3] new token key.
// ARGV[1] old token, ARGV[2] new token, ARGV[3] new json, ARGV[4] ttl.
const ROTATE_SCRIPT: &str = r#"
if redis.call('DEL', KEYS[1]) == 0 then
    return 0
end
redis.call('SREM', KEYS[2], ARGV[1])
redis.call('SET', KEYS[3], ARGV[3], 'EX', ARGV[4])
redis.call('SADD', KEYS[2], ARGV[2])
if redis.call('TTL', KEYS[2]) < tonumber(ARGV[4]) then
    redis.call('EXPIRE', KEYS[2], ARGV[4])
end
return 1
"#;

/// Redis-backed [`RefreshTokenStore`].
#[derive(Clone)]
pub struct RedisRefreshTokenStore {
    redis: ConnectionManager,
    store_script: Script,
    delete_script: Script,
    delete_all_script: Script,
    rotate_script: Script,
}

impl RedisRefreshTokenStore {
    /// Creates a new store over a pooled connection manager.
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            store_script: Script::new(STORE_SCRIPT),
            delete_script: Script::new(DELETE_SCRIPT),
            delete_all_script: Script::new(DELETE_ALL_SCRIPT),
            rotate_script: Script::new(ROTATE_SCRIPT),
        }
    }
}

#[async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
    async fn store(&self, record: &RefreshToken, ttl_secs: i64) -> Result<()> {
        let json = to_json(record)?;
        let _: i32 = self
            .store_script
            .key(token_key(&record.token))
            .key(user_index_key(record.user_id))
            .arg(&record.token)
            .arg(json)
            .arg(ttl_secs)
            .invoke_async(&mut self.redis.clone())
            .await?;

        tracing::debug!("Refresh token stored for user: {}", record.user_id);
        Ok(())
    }

    async fn lookup(&self, token: &str) -> Result<Option<RefreshToken>> {
        let json: Option<String> = self.redis.clone().get(token_key(token)).await?;

        json.as_deref().map(from_json).transpose()
    }

    async fn delete(&self, token: &str) -> Result<()> {
        let key = token_key(token);
        let current: Option<String> = self.redis.clone().get(&key).await?;
        let Some(current) = current else {
            return Ok(());
        };

        let record = from_json(&current)?;
        let removed: i32 = self
            .delete_script
            .key(&key)
            .key(user_index_key(record.user_id))
            .arg(token)
            .arg(current)
            .invoke_async(&mut self.redis.clone())
            .await?;

        if removed > 0 {
            tracing::debug!("Refresh token deleted");
        }
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<usize> {
        let index_key = user_index_key(user_id);
        let mut removed = 0;

        // Tokens rotated in between show up as remaining and are picked up by
        // the next pass.
        loop {
            let tokens: Vec<String> = self.redis.clone().smembers(&index_key).await?;

            let mut invocation = self.delete_all_script.key(&index_key);
            for token in &tokens {
                invocation.key(token_key(token)).arg(token);
            }

            let (deleted, remaining): (usize, usize) =
                invocation.invoke_async(&mut self.redis.clone()).await?;
            removed += deleted;

            if remaining == 0 {
                break;
            }
        }

        tracing::info!("Revoked {} refresh tokens for user: {}", removed, user_id);
        Ok(removed)
    }

    async fn rotate(
        &self,
        old_token: &str,
        replacement: &RefreshToken,
        ttl_secs: i64,
    ) -> Result<bool> {
        let json = to_json(replacement)?;
        let rotated: i32 = self
            .rotate_script
            .key(token_key(old_token))
            .key(user_index_key(replacement.user_id))
            .key(token_key(&replacement.token))
            .arg(old_token)
            .arg(&replacement.token)
            .arg(json)
            .arg(ttl_secs)
            .invoke_async(&mut self.redis.clone())
            .await?;

        Ok(rotated == 1)
    }
}
