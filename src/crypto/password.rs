//! Argon2id password hashing.
//!
//! Hashing and verification run on tokio's blocking pool. Plaintext copies
//! are zeroized once the blocking task finishes.

use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2, Params, ParamsBuilder,
};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{AppError, Result};

/// Salted, adaptive, one-way password hashing.
#[derive(Clone)]
pub struct PasswordHasher {
    inner: Arc<Inner>,
}

struct Inner {
    params: Params,
    /// Hash verified against when the account does not exist, so unknown
    /// emails cost the same as wrong passwords.
    dummy_hash: String,
}

impl PasswordHasher {
    /// Creates a hasher with the given Argon2id cost parameters.
    ///
    /// # Arguments
    ///
    /// * `memory_kib` - Memory cost in KiB.
    /// * `iterations` - Number of passes.
    /// * `parallelism` - Degree of parallelism.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = ParamsBuilder::new()
            .m_cost(memory_kib)
            .t_cost(iterations)
            .p_cost(parallelism)
            .build()
            .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?;

        let dummy_hash = hash_with(&params, b"nelonshift-dummy-password")?;

        Ok(Self {
            inner: Arc::new(Inner { params, dummy_hash }),
        })
    }

    /// Hashes a password on the blocking pool.
    ///
    /// # Returns
    ///
    /// A `Result` containing the PHC-formatted hash.
    pub async fn hash(&self, password: &str) -> Result<String> {
        let inner = self.inner.clone();
        let password = Zeroizing::new(password.as_bytes().to_vec());

        tokio::task::spawn_blocking(move || hash_with(&inner.params, &password))
            .await
            .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
    }

    /// Verifies a password against a stored PHC hash on the blocking pool.
    ///
    /// # Returns
    ///
    /// A `Result` containing `true` if the password matches.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = Zeroizing::new(password.as_bytes().to_vec());
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || verify_with(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
    }

    /// Burns one verification against the dummy hash. The outcome is ignored.
    pub async fn verify_dummy(&self, password: &str) -> Result<()> {
        let dummy = self.inner.dummy_hash.clone();
        self.verify(password, &dummy).await.map(|_| ())
    }
}

fn hash_with(params: &Params, password: &[u8]) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.clone(),
    );

    let password_hash = argon2
        .hash_password(password, &salt)
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
        .to_string();

    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

fn verify_with(password: &[u8], hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;

    // Cost parameters come from the PHC string, not from `Argon2::default()`.
    match Argon2::default().verify_password(password, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("Argon2 verify error: {}", e))),
    }
}
