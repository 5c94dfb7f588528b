use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use super::principal::Principal;
use crate::database::{StoreError, UserStore};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hashing(e.to_string()))
}

/// A malformed stored hash verifies as false.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Stored password hash is malformed: {}", e);
            return false;
        }
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Login lookup over the user store.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// `identifier` matches either email or username. Unknown users, wrong
    /// secrets and deactivated accounts all come back as `None`.
    pub async fn authenticate(&self, identifier: &str, secret: &str) -> Result<Option<Principal>, CredentialError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Ok(None);
        }

        let Some(mut user) = self.users.find_by_identifier(identifier).await? else {
            debug!("Login for unknown identifier");
            return Ok(None);
        };

        if !verify_password(secret, &user.password_hash) || !user.is_active {
            return Ok(None);
        }

        user.last_login = Some(Utc::now());
        self.users.replace(&user).await?;

        Ok(Some(user.principal()))
    }
}
