//! Store Client Module
//!
//! Issues one backend command per call on a freshly acquired connection.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{Command, ConnectionPool, Reply};

/// Thin façade over the pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StoreClient {
    pool: Arc<ConnectionPool>,
}

impl StoreClient {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Runs exactly one command. No retries.
    ///
    /// The connection is held only for this call and is released on every
    /// exit path, since it is dropped with this future.
    pub async fn execute(&self, command: Command) -> Result<Reply, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = conn.execute(&command).await;
        match &result {
            Ok(reply) => debug!(
                command = command.name(),
                key = command.key(),
                hit = reply.is_some(),
                "backend command"
            ),
            Err(err) => warn!(
                command = command.name(),
                key = command.key(),
                error = %err,
                "backend command failed"
            ),
        }
        result
    }

    // == Typed Commands ==
    pub async fn get(&self, key: &str) -> Result<Reply, StoreError> {
        self.execute(Command::Get {
            key: key.to_string(),
        })
        .await
    }

    pub async fn set(&self, key: &str, value: impl Into<Vec<u8>>) -> Result<(), StoreError> {
        self.execute(Command::Set {
            key: key.to_string(),
            value: value.into(),
        })
        .await
        .map(|_| ())
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Reply, StoreError> {
        self.execute(Command::HGet {
            key: key.to_string(),
            field: field.to_string(),
        })
        .await
    }

    /// Sets several hash fields in one command.
    pub async fn hmset(&self, key: &str, fields: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let fields = fields
            .iter()
            .map(|(field, value)| (field.to_string(), value.to_vec()))
            .collect();
        self.execute(Command::HMSet {
            key: key.to_string(),
            fields,
        })
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::{MemoryBackend, MemoryDialer};

    fn client(backend: &MemoryBackend) -> StoreClient {
        let pool = ConnectionPool::new(
            MemoryDialer::new(backend.clone()),
            Duration::from_millis(200),
        );
        StoreClient::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_get_absent_is_none_not_error() {
        let backend = MemoryBackend::new(2);
        let store = client(&backend);
        assert_eq!(store.get("animals:item:yak").await, Ok(None));
    }

    #[tokio::test]
    async fn test_set_get_hmset_hget() {
        let backend = MemoryBackend::new(2);
        let store = client(&backend);

        store.set("animals:item:cow", "moo").await.unwrap();
        store
            .hmset("animals:user:ann", &[("admin", b"false".as_slice())])
            .await
            .unwrap();

        assert_eq!(
            store.get("animals:item:cow").await.unwrap(),
            Some(b"moo".to_vec())
        );
        assert_eq!(
            store.hget("animals:user:ann", "admin").await.unwrap(),
            Some(b"false".to_vec())
        );
        assert_eq!(store.hget("animals:user:ann", "hash").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connection_released_after_each_command() {
        let backend = MemoryBackend::new(1);
        let store = client(&backend);

        for _ in 0..5 {
            store.get("k").await.unwrap();
            assert_eq!(backend.in_use(), 0);
        }
        assert_eq!(backend.command_count(), 5);
    }

    #[tokio::test]
    async fn test_connection_released_after_error() {
        let backend = MemoryBackend::new(1);
        backend.insert("plain", "x").await;
        let store = client(&backend);

        assert!(store.hget("plain", "f").await.is_err());
        assert_eq!(backend.in_use(), 0);
        assert!(store.get("plain").await.is_ok());
    }
}
