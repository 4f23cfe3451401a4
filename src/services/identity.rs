use crate::models::Principal;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Deliberately says nothing about which part of the credentials failed.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity backend failure: {0}")]
    Internal(String),
}

/// Credential verification capability.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Result<Principal, AuthError>;
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(e.to_string()))
}

/// Argon2 hashed accounts held in memory.
pub struct InMemoryIdentityProvider {
    users: DashMap<String, String>,
    /// Verified against for unknown usernames so both failure paths do the
    /// same amount of work.
    decoy_hash: String,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Result<Self, AuthError> {
        Ok(Self {
            users: DashMap::new(),
            decoy_hash: hash_password("decoy-password")?,
        })
    }

    /// Adds or replaces an account.
    pub fn add_user(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let hash = hash_password(password)?;
        self.users.insert(username.to_string(), hash);
        Ok(())
    }

    #[cfg(test)]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn verify(&self, username: &str, password: &str) -> Result<Principal, AuthError> {
        let stored = self.users.get(username).map(|h| h.value().clone());
        let known = stored.is_some();
        let hash = stored.unwrap_or_else(|| self.decoy_hash.clone());
        let candidate = password.to_owned();

        // Argon2 is deliberately slow; keep it off the async workers.
        let matches = tokio::task::spawn_blocking(move || -> Result<bool, AuthError> {
            let parsed =
                PasswordHash::new(&hash).map_err(|e| AuthError::Internal(e.to_string()))?;
            Ok(Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(|e| AuthError::Internal(format!("password check aborted: {}", e)))??;

        if known && matches {
            Ok(Principal {
                username: username.to_string(),
            })
        } else {
            tracing::warn!("Failed login attempt for {:?}", username);
            Err(AuthError::InvalidCredentials)
        }
    }
}
