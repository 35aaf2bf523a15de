//! Credential checks and user records
//!
//! User records live in the hash `animals:user:<username>` with a `hash`
//! field (PHC string) and an `admin` field that grants admin rights only when
//! it holds exactly `true`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::Argon2Hasher;
use crate::auth::PasswordError;
use crate::error::StoreError;
use crate::store::{user_key, StoreClient};

/// Name of the administrator seeded at startup
pub const BOOTSTRAP_USER: &str = "farmer";

const HASH_FIELD: &str = "hash";
const ADMIN_FIELD: &str = "admin";
const ADMIN_TRUE: &[u8] = b"true";

/// Failure to write a user record.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password worker failed: {0}")]
    Worker(String),
}

/// Verifies credentials and manages user records.
#[derive(Debug, Clone)]
pub struct AuthService {
    store: StoreClient,
    hasher: Arc<Argon2Hasher>,
}

impl AuthService {
    pub fn new(store: StoreClient, hasher: Argon2Hasher) -> Self {
        Self {
            store,
            hasher: Arc::new(hasher),
        }
    }

    /// True when `password` matches the stored hash for `username`.
    ///
    /// Never fails: unknown users, malformed hashes, and backend errors all
    /// yield `false`.
    pub async fn check_auth(&self, username: &str, password: &str) -> bool {
        let stored = match self.store.hget(&user_key(username), HASH_FIELD).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                debug!(username, "no credentials stored for user");
                return false;
            }
            Err(err) => {
                warn!(username, error = %err, "credential lookup failed");
                return false;
            }
        };

        let hasher = Arc::clone(&self.hasher);
        let password = password.to_owned();
        let matched =
            tokio::task::spawn_blocking(move || hasher.verify(&password, &stored)).await;
        match matched {
            Ok(matched) => {
                if !matched {
                    debug!(username, "password mismatch");
                }
                matched
            }
            Err(err) => {
                warn!(username, error = %err, "password verification task failed");
                false
            }
        }
    }

    /// True only when the user's `admin` field is exactly `true`.
    pub async fn check_admin(&self, username: &str) -> bool {
        match self.store.hget(&user_key(username), ADMIN_FIELD).await {
            Ok(Some(flag)) => flag == ADMIN_TRUE,
            Ok(None) => false,
            Err(err) => {
                warn!(username, error = %err, "admin flag lookup failed");
                false
            }
        }
    }

    /// Creates or updates a user with a freshly salted hash of `password`.
    ///
    /// Only the `hash` and `admin` fields are written; other fields of an
    /// existing record are kept.
    pub async fn set_user(&self, username: &str, password: &str, admin: &str) -> Result<(), AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Worker(e.to_string()))??;

        self.store
            .hmset(
                &user_key(username),
                &[
                    (HASH_FIELD, hash.as_bytes()),
                    (ADMIN_FIELD, admin.as_bytes()),
                ],
            )
            .await?;
        info!(username, admin, "user record written");
        Ok(())
    }

    /// Seeds or refreshes the bootstrap administrator.
    pub async fn seed_bootstrap_user(&self, password: &str) -> Result<(), AuthError> {
        self.set_user(BOOTSTRAP_USER, password, "true").await
    }
}
