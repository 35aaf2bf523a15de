//! In-process backend
//!
//! A HashMap-backed stand-in for Redis with the same command semantics and a
//! bounded number of concurrent connections. Used by the test suites and for
//! running the service without a Redis server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{Backend, Command, Connection, Dialer, Reply};

/// How long `close` waits for checked-out connections to come back.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
}

#[derive(Debug)]
struct Inner {
    entries: RwLock<HashMap<String, Value>>,
    connections: Arc<Semaphore>,
    max_connections: usize,
    closed: AtomicBool,
    commands: AtomicUsize,
    command_delay: Duration,
}

// == Memory Backend ==
/// Shared in-memory key-value data. Clones see the same data.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl MemoryBackend {
    /// Creates an empty store allowing `max_connections` concurrent checkouts.
    pub fn new(max_connections: usize) -> Self {
        Self::with_command_delay(max_connections, Duration::ZERO)
    }

    /// Like `new`, but every command holds its connection for `delay`
    /// before answering, like a slow network round trip.
    pub fn with_command_delay(max_connections: usize, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                connections: Arc::new(Semaphore::new(max_connections)),
                max_connections,
                closed: AtomicBool::new(false),
                commands: AtomicUsize::new(0),
                command_delay: delay,
            }),
        }
    }

    /// Number of connections currently checked out.
    pub fn in_use(&self) -> usize {
        self.inner.max_connections - self.inner.connections.available_permits()
    }

    /// Total commands executed so far.
    pub fn command_count(&self) -> usize {
        self.inner.commands.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stores a plain value directly, bypassing any connection.
    pub async fn insert(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.inner
            .entries
            .write()
            .await
            .insert(key.into(), Value::Bytes(value.into()));
    }

    /// Reads a plain value directly.
    pub async fn value(&self, key: &str) -> Option<Vec<u8>> {
        match self.inner.entries.read().await.get(key) {
            Some(Value::Bytes(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Reads one hash field directly.
    pub async fn hash_field(&self, key: &str, field: &str) -> Option<Vec<u8>> {
        match self.inner.entries.read().await.get(key) {
            Some(Value::Hash(fields)) => fields.get(field).cloned(),
            _ => None,
        }
    }

    async fn apply(&self, command: &Command) -> Result<Reply, StoreError> {
        self.inner.commands.fetch_add(1, Ordering::Relaxed);
        match command {
            Command::Get { key } => match self.inner.entries.read().await.get(key) {
                None => Ok(None),
                Some(Value::Bytes(bytes)) => Ok(Some(bytes.clone())),
                Some(Value::Hash(_)) => Err(StoreError::Unavailable(WRONG_TYPE.to_string())),
            },
            Command::Set { key, value } => {
                self.inner
                    .entries
                    .write()
                    .await
                    .insert(key.clone(), Value::Bytes(value.clone()));
                Ok(None)
            }
            Command::HGet { key, field } => match self.inner.entries.read().await.get(key) {
                None => Ok(None),
                Some(Value::Hash(fields)) => Ok(fields.get(field).cloned()),
                Some(Value::Bytes(_)) => Err(StoreError::Unavailable(WRONG_TYPE.to_string())),
            },
            Command::HMSet { key, fields } => {
                let mut entries = self.inner.entries.write().await;
                let entry = entries
                    .entry(key.clone())
                    .or_insert_with(|| Value::Hash(HashMap::new()));
                match entry {
                    Value::Hash(existing) => {
                        existing.extend(fields.iter().cloned());
                        Ok(None)
                    }
                    Value::Bytes(_) => Err(StoreError::Unavailable(WRONG_TYPE.to_string())),
                }
            }
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn checkout(&self) -> Result<Box<dyn Connection>, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let permit = Arc::clone(&self.inner.connections)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Closed)?;
        Ok(Box::new(MemoryConnection {
            backend: self.clone(),
            _permit: permit,
        }))
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while self.in_use() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            debug!(in_use = self.in_use(), "memory backend closed with connections out");
        }
        self.inner.connections.close();
    }
}

/// A checked-out slot. Dropping it frees the slot.
struct MemoryConnection {
    backend: MemoryBackend,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, command: &Command) -> Result<Reply, StoreError> {
        if self.backend.is_closed() {
            return Err(StoreError::Closed);
        }
        let delay = self.backend.inner.command_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.backend.apply(command).await
    }
}

// == Memory Dialer ==
/// Hands out a shared `MemoryBackend` and counts how often it was dialed.
#[derive(Debug, Clone)]
pub struct MemoryDialer {
    backend: MemoryBackend,
    dials: Arc<AtomicUsize>,
    dial_delay: Duration,
    fail_first: usize,
}

impl MemoryDialer {
    pub fn new(backend: MemoryBackend) -> Self {
        Self {
            backend,
            dials: Arc::new(AtomicUsize::new(0)),
            dial_delay: Duration::ZERO,
            fail_first: 0,
        }
    }

    /// Makes every dial take `delay`, like a slow network handshake.
    pub fn with_dial_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = delay;
        self
    }

    /// Makes the first `attempts` dials fail.
    pub fn failing_first(mut self, attempts: usize) -> Self {
        self.fail_first = attempts;
        self
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for MemoryDialer {
    async fn dial(&self) -> Result<Arc<dyn Backend>, StoreError> {
        let attempt = self.dials.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.dial_delay.is_zero() {
            tokio::time::sleep(self.dial_delay).await;
        }
        if attempt <= self.fail_first {
            return Err(StoreError::Unavailable(format!(
                "connection refused (attempt {attempt})"
            )));
        }
        Ok(Arc::new(self.backend.clone()))
    }
}
