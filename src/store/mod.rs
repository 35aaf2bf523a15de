//! Store Module
//!
//! Pooled access to the key-value backend: the lazily dialed
//! `ConnectionPool`, the single-command `StoreClient`, and the two backend
//! implementations (Redis and in-process memory).

mod client;
pub mod memory;
mod pool;
pub mod redis;

pub use client::StoreClient;
pub use memory::{MemoryBackend, MemoryDialer};
pub use pool::{Backend, Connection, ConnectionPool, Dialer, PoolState};
pub use self::redis::RedisDialer;

// == Key Layout ==
/// Prefix of animal sound records
pub const ANIMAL_KEY_PREFIX: &str = "animals:item:";

/// Prefix of user credential records
pub const USER_KEY_PREFIX: &str = "animals:user:";

/// Key of the record holding the sound of `name`.
pub fn animal_key(name: &str) -> String {
    format!("{ANIMAL_KEY_PREFIX}{name}")
}

/// Key of the hash holding the credentials of `username`.
pub fn user_key(username: &str) -> String {
    format!("{USER_KEY_PREFIX}{username}")
}

/// Raw result of a command: the stored bytes, or `None` when absent.
pub type Reply = Option<Vec<u8>>;

// == Commands ==
/// The command surface the service needs from its backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: Vec<u8> },
    HGet { key: String, field: String },
    HMSet { key: String, fields: Vec<(String, Vec<u8>)> },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::HGet { .. } => "HGET",
            Command::HMSet { .. } => "HMSET",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Command::Get { key }
            | Command::Set { key, .. }
            | Command::HGet { key, .. }
            | Command::HMSet { key, .. } => key,
        }
    }
}
