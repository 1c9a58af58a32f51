use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::{error::SqlState, Row};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::{NewUser, User},
};

/// Persisted user records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user. Fails with `AlreadyExists` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User>;

    /// Finds a user by their (normalized) email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Finds a user by their ID.
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Changes the display name. Returns `None` if the user does not exist.
    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<Option<User>>;

    /// Replaces the password hash. Returns `false` if the user does not exist.
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool>;

    /// Deletes a user. Returns `false` if the user did not exist.
    async fn delete(&self, user_id: Uuid) -> Result<bool>;
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

/// PostgreSQL-backed [`UserRepository`].
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool,
}

impl PgUserRepository {
    /// Creates a new repository over the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO users (id, email, password, name)
                VALUES ($1, $2, $3, $4)
                RETURNING id, email, password, name, created_at
                "#,
                &[&Uuid::new_v4(), &user.email, &user.password_hash, &user.name],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::AlreadyExists("Email already in use".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;
        row_to_user(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, email, password, name, created_at
                FROM users
                WHERE email = $1
                "#,
                &[&email],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, email, password, name, created_at
                FROM users
                WHERE id = $1
                "#,
                &[&user_id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn update_name(&self, user_id: Uuid, name: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                UPDATE users
                SET name = $1
                WHERE id = $2
                RETURNING id, email, password, name, created_at
                "#,
                &[&name, &user_id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<bool> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE users
                SET password = $1
                WHERE id = $2
                "#,
                &[&password_hash, &user_id],
            )
            .await?;
        Ok(updated > 0)
    }

    async fn delete(&self, user_id: Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM users WHERE id = $1", &[&user_id])
            .await?;
        Ok(deleted > 0)
    }
}
