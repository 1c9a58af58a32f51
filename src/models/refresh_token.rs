use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// A persisted refresh token, keyed by its opaque token string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    /// The opaque token string handed to the client.
    pub token: String,
    /// The ID of the user this token belongs to.
    pub user_id: Uuid,
    /// The timestamp when the token was issued.
    pub created_at: DateTime<Utc>,
    /// The timestamp after which the token is no longer accepted.
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Creates a record for `token` that expires `ttl_secs` from now.
    pub fn new(token: String, user_id: Uuid, ttl_secs: i64) -> Result<Self> {
        let created_at = Utc::now();
        let expires_at = Duration::try_seconds(ttl_secs)
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::Internal(format!("Refresh token TTL out of range: {}", ttl_secs))
            })?;

        Ok(Self {
            token,
            user_id,
            created_at,
            expires_at,
        })
    }

    /// Whether the application-level expiry has passed.
    #[inline]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
