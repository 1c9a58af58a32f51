use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::config::Config;
use crate::crypto::jwt::TokenSigner;
use crate::crypto::password::PasswordHasher;
use crate::error::Result;
use crate::repositories::{
    login_attempts::{LoginAttemptStore, RedisLoginAttemptStore},
    refresh_token::{RedisRefreshTokenStore, RefreshTokenStore},
    user::{PgUserRepository, UserRepository},
};
use crate::services::auth::SessionManager;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Login, refresh and logout.
    pub sessions: SessionManager,
    /// The credential store.
    pub users: Arc<dyn UserRepository>,
    /// Failed-login counters for the login throttle.
    pub login_attempts: Arc<dyn LoginAttemptStore>,
}

impl AppState {
    /// Creates a new `AppState` connected to PostgreSQL and Redis.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url, config.db_pool_max_size)?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");

        Self::from_parts(
            config,
            Arc::new(PgUserRepository::new(db)),
            Arc::new(RedisRefreshTokenStore::new(redis.clone())),
            Arc::new(RedisLoginAttemptStore::new(redis)),
        )
    }

    /// Assembles the state from already constructed stores.
    pub fn from_parts(
        config: &Config,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        login_attempts: Arc<dyn LoginAttemptStore>,
    ) -> Result<Self> {
        let signer = TokenSigner::new(config.jwt_secret.as_bytes(), config.access_token_ttl_secs);
        let hasher = PasswordHasher::new(
            config.argon2_memory_kib,
            config.argon2_iterations,
            config.argon2_parallelism,
        )?;
        tracing::info!("✅ Token signer and password hasher initialized");

        let sessions = SessionManager::new(
            users.clone(),
            refresh_tokens,
            signer,
            hasher,
            config.refresh_token_ttl_secs,
        );

        Ok(AppState {
            config: config.clone(),
            sessions,
            users,
            login_attempts,
        })
    }
}
