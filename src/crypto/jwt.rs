//! Access-token signing and verification.
//!
//! Access tokens are HS256-signed JWTs carrying a [`Claims`] payload. They are
//! stateless: validity depends only on the signature and `exp`, so an issued
//! token stays usable until it expires even after logout.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::crypto::token::generate_refresh_token;
use crate::error::{AppError, Result};

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's id.
    pub sub: Uuid,
    pub email: String,
    /// Display name at the time of issuance.
    pub name: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Unique token identifier, so two tokens issued in the same second differ.
    pub jti: Uuid,
}

/// The identity carried by a verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
}

/// Why an access token was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
}

/// Issues and verifies signed bearer credentials.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl_secs: i64,
}

impl TokenSigner {
    /// Creates a signer from a shared HMAC secret.
    ///
    /// # Arguments
    ///
    /// * `secret` - The symmetric signing key.
    /// * `access_ttl_secs` - Lifetime of issued access tokens.
    pub fn new(secret: &[u8], access_ttl_secs: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl_secs,
        }
    }

    /// Lifetime of issued access tokens in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Issues a signed access token for the given user.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        display_name: &str,
    ) -> Result<String> {
        let now = Utc::now().timestamp();
        let exp = now.checked_add(self.access_ttl_secs).ok_or_else(|| {
            AppError::Internal(format!("Access token TTL out of range: {}", self.access_ttl_secs))
        })?;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            name: display_name.to_string(),
            iat: now,
            exp,
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token signing error: {}", e)))
    }

    /// Checks signature and expiry, returning the embedded identity.
    pub fn verify_access_token(&self, token: &str) -> std::result::Result<AccessIdentity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;

        Ok(AccessIdentity {
            user_id: data.claims.sub,
            email: data.claims.email,
            display_name: data.claims.name,
        })
    }

    /// Issues an opaque refresh token. It is not self-describing; its meaning
    /// lives entirely in the refresh token store.
    pub fn issue_refresh_token(&self) -> String {
        generate_refresh_token()
    }
}
