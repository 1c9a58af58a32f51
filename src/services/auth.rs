use std::sync::Arc;

use uuid::Uuid;

use crate::crypto::jwt::TokenSigner;
use crate::crypto::password::PasswordHasher;
use crate::error::{AppError, Result};
use crate::models::refresh_token::RefreshToken;
use crate::models::user::{NewUser, User};
use crate::repositories::refresh_token::RefreshTokenStore;
use crate::repositories::user::UserRepository;
use crate::validation::auth::{normalize_email, validate_display_name, validate_password};

/// An access/refresh token pair handed out by login and refresh.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

/// Orchestrates login, refresh rotation, logout and identity resolution.
///
/// Every operation that acts on behalf of a signed-in user takes the verified
/// `user_id` explicitly; nothing is read from ambient request state.
#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    signer: TokenSigner,
    hasher: PasswordHasher,
    refresh_ttl_secs: i64,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        signer: TokenSigner,
        hasher: PasswordHasher,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            signer,
            hasher,
            refresh_ttl_secs,
        }
    }

    /// The signer, for verifying access tokens at the HTTP boundary.
    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.signer.access_ttl_secs()
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    /// Creates a new account.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `User`.
    pub async fn register(&self, email: &str, name: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        let name = name.trim();
        validate_display_name(name)?;
        validate_password(password)?;

        tracing::debug!("🔐 Creating user: {}", email);

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::AlreadyExists("Email already in use".to_string()));
        }

        let password_hash = self.hasher.hash(password).await?;
        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
                name: name.to_string(),
            })
            .await?;

        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user)
    }

    /// Verifies credentials and opens a new session.
    ///
    /// Unknown email and wrong password fail identically with
    /// `InvalidCredentials`. Nothing is persisted unless both tokens exist.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession> {
        let email = normalize_email(email);
        tracing::debug!("🔐 Authenticating user: {}", email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.hasher.verify_dummy(password).await?;
            return Err(AppError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self
            .signer
            .issue_access_token(user.id, &user.email, &user.name)?;

        let record = RefreshToken::new(
            self.signer.issue_refresh_token(),
            user.id,
            self.refresh_ttl_secs,
        )?;
        self.refresh_tokens.store(&record, self.refresh_ttl_secs).await?;

        tracing::info!("✅ User authenticated: {}", user.id);

        Ok(IssuedSession {
            user,
            access_token,
            refresh_token: record.token,
        })
    }

    /// Exchanges a refresh token for a new token pair, consuming the old one.
    ///
    /// A failed check never consumes the presented token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedSession> {
        let record = self
            .refresh_tokens
            .lookup(refresh_token)
            .await?
            .ok_or(AppError::TokenRefresh)?;

        // The store TTL is only a backstop.
        if record.is_expired() {
            tracing::info!("Refresh token expired for user: {}", record.user_id);
            self.refresh_tokens.delete(refresh_token).await?;
            return Err(AppError::TokenRefresh);
        }

        let Some(user) = self.users.find_by_id(record.user_id).await? else {
            tracing::warn!("Refresh token owner no longer exists: {}", record.user_id);
            self.refresh_tokens.delete_all_for_user(record.user_id).await?;
            return Err(AppError::TokenRefresh);
        };

        let access_token = self
            .signer
            .issue_access_token(user.id, &user.email, &user.name)?;

        let replacement = RefreshToken::new(
            self.signer.issue_refresh_token(),
            user.id,
            self.refresh_ttl_secs,
        )?;

        if !self
            .refresh_tokens
            .rotate(refresh_token, &replacement, self.refresh_ttl_secs)
            .await?
        {
            tracing::warn!("Refresh token already rotated for user: {}", user.id);
            return Err(AppError::TokenRefresh);
        }

        tracing::info!("✅ Tokens rotated for user: {}", user.id);

        Ok(IssuedSession {
            user,
            access_token,
            refresh_token: replacement.token,
        })
    }

    /// Ends the session behind `refresh_token`. Always succeeds for unknown
    /// or absent tokens. Issued access tokens stay valid until they expire.
    pub async fn logout(&self, refresh_token: Option<&str>) -> Result<()> {
        if let Some(token) = refresh_token {
            self.refresh_tokens.delete(token).await?;
        }
        tracing::info!("👋 Logout completed");
        Ok(())
    }

    /// Revokes every refresh token of the user.
    ///
    /// # Returns
    ///
    /// The number of sessions that were revoked.
    pub async fn logout_everywhere(&self, user_id: Uuid) -> Result<usize> {
        let revoked = self.refresh_tokens.delete_all_for_user(user_id).await?;
        tracing::info!("👋 Logged out everywhere: {} ({} sessions)", user_id, revoked);
        Ok(revoked)
    }

    /// Re-reads the authoritative record of an already verified identity.
    pub async fn current_user(&self, user_id: Uuid) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Changes a user's password and revokes all their refresh tokens.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        tracing::info!("🔑 Changing password for user: {}", user_id);

        validate_password(new_password)?;
        let user = self.current_user(user_id).await?;

        if !self.hasher.verify(old_password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }

        let new_hash = self.hasher.hash(new_password).await?;
        if !self.users.update_password(user_id, &new_hash).await? {
            return Err(AppError::NotFound);
        }

        self.refresh_tokens.delete_all_for_user(user_id).await?;

        tracing::info!("✅ Password changed for user: {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::jwt::TokenError;
    use crate::repositories::memory::{InMemoryRefreshTokenStore, InMemoryUserRepository};

    const SECRET: &[u8] = b"test-secret-that-is-long-enough-for-hmac";

    struct Harness {
        sessions: SessionManager,
        users: InMemoryUserRepository,
        tokens: InMemoryRefreshTokenStore,
    }

    fn harness() -> Harness {
        let users = InMemoryUserRepository::new();
        let tokens = InMemoryRefreshTokenStore::new();
        let sessions = SessionManager::new(
            Arc::new(users.clone()),
            Arc::new(tokens.clone()),
            TokenSigner::new(SECRET, 900),
            PasswordHasher::new(1024, 1, 1).unwrap(),
            3600,
        );
        Harness {
            sessions,
            users,
            tokens,
        }
    }

    async fn signed_up(h: &Harness) -> User {
        h.sessions
            .register("a@x.com", "Alice", "secret1")
            .await
            .expect("signup should succeed")
    }

    #[tokio::test]
    async fn signup_then_login_with_right_and_wrong_password() {
        let h = harness();
        signed_up(&h).await;

        let session = h.sessions.login("a@x.com", "secret1").await.unwrap();
        assert!(!session.access_token.is_empty());
        assert!(!session.refresh_token.is_empty());

        assert!(matches!(
            h.sessions.login("a@x.com", "wrong").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn huge_refresh_ttl_fails_login_without_storing() {
        let users = InMemoryUserRepository::new();
        let tokens = InMemoryRefreshTokenStore::new();
        let sessions = SessionManager::new(
            Arc::new(users),
            Arc::new(tokens.clone()),
            TokenSigner::new(SECRET, 900),
            PasswordHasher::new(1024, 1, 1).unwrap(),
            i64::MAX,
        );
        sessions.register("a@x.com", "Alice", "secret1").await.unwrap();

        let outcome = tokio::spawn(async move { sessions.login("a@x.com", "secret1").await })
            .await
            .expect("login must not panic");
        assert!(matches!(outcome, Err(AppError::Internal(_))));
        assert_eq!(tokens.live_count(None).await, 0);
    }

    #[tokio::test]
    async fn unknown_email_fails_like_wrong_password() {
        let h = harness();
        signed_up(&h).await;

        let unknown = h.sessions.login("nobody@x.com", "secret1").await.unwrap_err();
        let wrong = h.sessions.login("a@x.com", "wrong").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn login_email_is_case_insensitive() {
        let h = harness();
        signed_up(&h).await;

        assert!(h.sessions.login("  A@X.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected() {
        let h = harness();
        signed_up(&h).await;

        assert!(matches!(
            h.sessions.register("A@x.com", "Other", "secret2").await,
            Err(AppError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn failed_login_creates_no_refresh_token() {
        let h = harness();
        signed_up(&h).await;

        let _ = h.sessions.login("a@x.com", "wrong").await;
        let _ = h.sessions.login("ghost@x.com", "secret1").await;

        assert_eq!(h.tokens.live_count(None).await, 0);
    }

    #[tokio::test]
    async fn rotation_invalidates_the_old_token() {
        let h = harness();
        signed_up(&h).await;
        let first = h.sessions.login("a@x.com", "secret1").await.unwrap();

        let second = h.sessions.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        assert!(matches!(
            h.sessions.refresh(&first.refresh_token).await,
            Err(AppError::TokenRefresh)
        ));
        assert!(h.sessions.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn rotation_preserves_identity() {
        let h = harness();
        let user = signed_up(&h).await;
        let first = h.sessions.login("a@x.com", "secret1").await.unwrap();

        let second = h.sessions.refresh(&first.refresh_token).await.unwrap();

        let identity = h
            .sessions
            .signer()
            .verify_access_token(&second.access_token)
            .unwrap();
        assert_eq!(identity.user_id, user.id);

        let stored = h
            .tokens
            .lookup(&second.refresh_token)
            .await
            .unwrap()
            .expect("new refresh token must be stored");
        assert_eq!(stored.user_id, user.id);
    }

    #[tokio::test]
    async fn expired_record_is_rejected_before_store_eviction() {
        let h = harness();
        let user = signed_up(&h).await;

        let mut record = RefreshToken::new("stale-token".into(), user.id, 3600).unwrap();
        record.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        h.tokens.store(&record, 3600).await.unwrap();

        assert!(matches!(
            h.sessions.refresh("stale-token").await,
            Err(AppError::TokenRefresh)
        ));
        assert_eq!(h.tokens.lookup("stale-token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_refresh_token_is_rejected() {
        let h = harness();
        assert!(matches!(
            h.sessions.refresh("never-issued").await,
            Err(AppError::TokenRefresh)
        ));
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_blocks_refresh() {
        let h = harness();
        signed_up(&h).await;
        let session = h.sessions.login("a@x.com", "secret1").await.unwrap();

        h.sessions.logout(Some(&session.refresh_token)).await.unwrap();
        assert!(matches!(
            h.sessions.refresh(&session.refresh_token).await,
            Err(AppError::TokenRefresh)
        ));
        h.sessions.logout(Some(&session.refresh_token)).await.unwrap();
        h.sessions.logout(None).await.unwrap();
    }

    #[tokio::test]
    async fn access_token_survives_logout() {
        let h = harness();
        let user = signed_up(&h).await;
        let session = h.sessions.login("a@x.com", "secret1").await.unwrap();

        let before = h.sessions.signer().verify_access_token(&session.access_token);
        h.sessions.logout(Some(&session.refresh_token)).await.unwrap();
        let after = h.sessions.signer().verify_access_token(&session.access_token);

        assert_eq!(before, after);
        assert_eq!(after.map(|i| i.user_id), Ok::<_, TokenError>(user.id));
    }

    #[tokio::test]
    async fn concurrent_refresh_has_exactly_one_winner() {
        let h = harness();
        signed_up(&h).await;
        let session = h.sessions.login("a@x.com", "secret1").await.unwrap();

        let (a, b) = tokio::join!(
            h.sessions.refresh(&session.refresh_token),
            h.sessions.refresh(&session.refresh_token),
        );

        let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(winners, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser, Err(AppError::TokenRefresh)));
        assert_eq!(h.tokens.live_count(None).await, 1);
    }

    #[tokio::test]
    async fn concurrent_refresh_across_tasks_has_exactly_one_winner() {
        let h = harness();
        signed_up(&h).await;
        let session = h.sessions.login("a@x.com", "secret1").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sessions = h.sessions.clone();
                let token = session.refresh_token.clone();
                tokio::spawn(async move { sessions.refresh(&token).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AppError::TokenRefresh) => {}
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn refresh_reflects_profile_changes() {
        let h = harness();
        let user = signed_up(&h).await;
        let session = h.sessions.login("a@x.com", "secret1").await.unwrap();

        h.users.update_name(user.id, "Alicia").await.unwrap();
        let rotated = h.sessions.refresh(&session.refresh_token).await.unwrap();

        let identity = h
            .sessions
            .signer()
            .verify_access_token(&rotated.access_token)
            .unwrap();
        assert_eq!(identity.display_name, "Alicia");
    }

    #[tokio::test]
    async fn refresh_for_deleted_user_fails() {
        let h = harness();
        let user = signed_up(&h).await;
        let session = h.sessions.login("a@x.com", "secret1").await.unwrap();

        h.users.delete(user.id).await.unwrap();

        assert!(matches!(
            h.sessions.refresh(&session.refresh_token).await,
            Err(AppError::TokenRefresh)
        ));
        assert_eq!(h.tokens.live_count(Some(user.id)).await, 0);
    }

    #[tokio::test]
    async fn current_user_of_deleted_account_is_not_found() {
        let h = harness();
        let user = signed_up(&h).await;

        assert_eq!(h.sessions.current_user(user.id).await.unwrap().email, "a@x.com");
        h.users.delete(user.id).await.unwrap();
        assert!(matches!(
            h.sessions.current_user(user.id).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn logout_everywhere_revokes_all_devices() {
        let h = harness();
        let user = signed_up(&h).await;
        let phone = h.sessions.login("a@x.com", "secret1").await.unwrap();
        let laptop = h.sessions.login("a@x.com", "secret1").await.unwrap();

        assert_eq!(h.sessions.logout_everywhere(user.id).await.unwrap(), 2);
        for token in [phone.refresh_token, laptop.refresh_token] {
            assert!(matches!(
                h.sessions.refresh(&token).await,
                Err(AppError::TokenRefresh)
            ));
        }
    }

    #[tokio::test]
    async fn change_password_revokes_sessions() {
        let h = harness();
        let user = signed_up(&h).await;
        let session = h.sessions.login("a@x.com", "secret1").await.unwrap();

        assert!(matches!(
            h.sessions.change_password(user.id, "wrong", "secret2").await,
            Err(AppError::InvalidCredentials)
        ));

        h.sessions
            .change_password(user.id, "secret1", "secret2")
            .await
            .unwrap();

        assert!(matches!(
            h.sessions.refresh(&session.refresh_token).await,
            Err(AppError::TokenRefresh)
        ));
        assert!(h.sessions.login("a@x.com", "secret1").await.is_err());
        assert!(h.sessions.login("a@x.com", "secret2").await.is_ok());
    }
}
