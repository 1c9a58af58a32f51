//! In-process implementations of the store traits.
//!
//! They mirror the Redis/PostgreSQL semantics closely enough (passive TTL,
//! idempotent deletes, unique emails, atomic rotation) to stand in for the real
//! backends in tests and local experiments.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        refresh_token::RefreshToken,
        user::{NewUser, User},
    },
    repositories::{
        login_attempts::LoginAttemptStore, refresh_token::RefreshTokenStore, user::UserRepository,
    },
};

/// A value with a store-level deadline.
#[derive(Clone)]
struct Expiring<T> {
    value: T,
    evict_at: DateTime<Utc>,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl_secs: i64) -> Result<Self> {
        let evict_at = Duration::try_seconds(ttl_secs)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| AppError::Internal(format!("TTL out of range: {}", ttl_secs)))?;

        Ok(Self { value, evict_at })
    }

    fn is_live(&self) -> bool {
        Utc::now() < self.evict_at
    }
}

/// In-memory [`UserRepository`].
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.lock().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::AlreadyExists("Email already in use".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.lock().await.get(&user_id).cloned())
    }

    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<Option<User>> {
        let mut users = self.users.lock().await;
        Ok(users.get_mut(&user_id).map(|user| {
            user.name = name.to_string();
            user.clone()
        }))
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool> {
        let mut users = self.users.lock().await;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.users.lock().await.remove(&user_id).is_some())
    }
}

/// In-memory [`RefreshTokenStore`] with passive expiry.
#[derive(Clone, Default)]
pub struct InMemoryRefreshTokenStore {
    tokens: Arc<Mutex<HashMap<String, Expiring<RefreshToken>>>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records, optionally restricted to one user.
    pub async fn live_count(&self, user_id: Option<Uuid>) -> usize {
        self.tokens
            .lock()
            .await
            .values()
            .filter(|e| e.is_live())
            .filter(|e| user_id.is_none_or(|id| e.value.user_id == id))
            .count()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn store(&self, record: &RefreshToken, ttl_secs: i64) -> Result<()> {
        let entry = Expiring::new(record.clone(), ttl_secs)?;
        let mut tokens = self.tokens.lock().await;
        tokens.retain(|_, e| e.is_live());
        tokens.insert(record.token.clone(), entry);
        Ok(())
    }

    async fn lookup(&self, token: &str) -> Result<Option<RefreshToken>> {
        let mut tokens = self.tokens.lock().await;
        match tokens.get(token) {
            Some(e) if e.is_live() => Ok(Some(e.value.clone())),
            Some(_) => {
                tokens.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, token: &str) -> Result<()> {
        self.tokens.lock().await.remove(token);
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<usize> {
        let mut tokens = self.tokens.lock().await;
        let removed = tokens
            .values()
            .filter(|e| e.value.user_id == user_id && e.is_live())
            .count();
        tokens.retain(|_, e| e.value.user_id != user_id);
        Ok(removed)
    }

    async fn rotate(
        &self,
        old_token: &str,
        replacement: &RefreshToken,
        ttl_secs: i64,
    ) -> Result<bool> {
        let entry = Expiring::new(replacement.clone(), ttl_secs)?;
        let mut tokens = self.tokens.lock().await;
        match tokens.remove(old_token) {
            Some(e) if e.is_live() => {
                tokens.insert(replacement.token.clone(), entry);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory [`LoginAttemptStore`].
#[derive(Clone, Default)]
pub struct InMemoryLoginAttemptStore {
    counters: Arc<Mutex<HashMap<String, Expiring<u32>>>>,
}

impl InMemoryLoginAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoginAttemptStore for InMemoryLoginAttemptStore {
    async fn attempts(&self, key: &str) -> Result<Option<(u32, u64)>> {
        let counters = self.counters.lock().await;
        Ok(counters.get(key).filter(|e| e.is_live()).map(|e| {
            let remaining = (e.evict_at - Utc::now()).num_seconds().max(0) as u64;
            (e.value, remaining)
        }))
    }

    async fn record_failure(&self, key: &str, window_secs: u64) -> Result<()> {
        let mut counters = self.counters.lock().await;
        let count = counters
            .get(key)
            .filter(|e| e.is_live())
            .map_or(0, |e| e.value);
        let window_secs = i64::try_from(window_secs)
            .map_err(|_| AppError::Internal(format!("Lockout window out of range: {}", window_secs)))?;
        counters.insert(key.to_string(), Expiring::new(count + 1, window_secs)?);
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.counters.lock().await.remove(key);
        Ok(())
    }
}
