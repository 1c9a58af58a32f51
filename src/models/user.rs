use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents a user in the system.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's email address, trimmed and lower-cased.
    pub email: String,
    /// The user's Argon2id password hash.
    pub password_hash: String,
    /// The user's display name.
    pub name: String,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user. The password is already hashed.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

/// The public view of a user.
#[derive(Serialize, Debug, Clone)]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: user.created_at,
        }
    }
}
