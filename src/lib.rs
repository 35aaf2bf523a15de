//! Animals - a deliberately slow farm API
//!
//! Serves animal sounds from Redis over HTTP, with Basic-auth protected,
//! admin-only writes and a per-user credential store.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod store;

pub use api::{create_router, AppState};
pub use config::Config;
