//! Auth Module
//!
//! Basic-auth credential parsing, Argon2 password hashing, the user record
//! service, and the axum middleware that guards admin routes.

mod basic;
mod middleware;
mod password;
mod service;

pub use basic::BasicCredentials;
pub use middleware::{require_admin, require_auth};
pub use password::{Argon2Hasher, PasswordError};
pub use service::{AuthError, AuthService, BOOTSTRAP_USER};
