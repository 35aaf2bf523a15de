//! Connection Pool Module
//!
//! Owns the lazily dialed backend and hands out pooled connections.
//!
//! The first caller to find the pool uninitialized dials the backend while
//! holding the init lock. Callers that queue behind it re-check after taking
//! the lock: they share the dialed backend on success, and share the error on
//! failure. The pool then reverts to uninitialized so a later caller can retry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::{Command, Reply};

// == Backend Seams ==
/// Produces a ready backend. Called at most once per successful init.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self) -> Result<Arc<dyn Backend>, StoreError>;
}

/// A dialed backend holding a bounded set of connections.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Checks out one connection. It returns to the backend when dropped.
    async fn checkout(&self) -> Result<Box<dyn Connection>, StoreError>;

    /// Closes every pooled connection and waits for them to drain.
    async fn close(&self);
}

/// One checked-out connection.
#[async_trait]
pub trait Connection: Send {
    async fn execute(&mut self, command: &Command) -> Result<Reply, StoreError>;
}

/// Lifecycle of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Outcome of the most recent failed dial.
struct InitFailure {
    seq: u64,
    error: StoreError,
}

// == Connection Pool ==
/// Shared, lazily initialized pool of backend connections.
pub struct ConnectionPool {
    dialer: Box<dyn Dialer>,
    ready: OnceCell<Arc<dyn Backend>>,
    /// Held for the whole dial; remembers the last failure for waiters.
    init: Mutex<Option<InitFailure>>,
    /// Count of failed dials, bumped under `init`.
    failures: AtomicU64,
    closed: AtomicBool,
    checkout_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(dialer: impl Dialer + 'static, checkout_timeout: Duration) -> Self {
        Self {
            dialer: Box::new(dialer),
            ready: OnceCell::new(),
            init: Mutex::new(None),
            failures: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            checkout_timeout,
        }
    }

    pub fn state(&self) -> PoolState {
        if self.closed.load(Ordering::Acquire) {
            PoolState::Closed
        } else if self.ready.initialized() {
            PoolState::Ready
        } else if self.init.try_lock().is_err() {
            PoolState::Initializing
        } else {
            PoolState::Uninitialized
        }
    }

    /// Dials the backend unless that already happened. Safe to call from
    /// any number of tasks at once.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.backend().await.map(|_| ())
    }

    async fn backend(&self) -> Result<Arc<dyn Backend>, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        if let Some(backend) = self.ready.get() {
            return Ok(Arc::clone(backend));
        }

        let failures_seen = self.failures.load(Ordering::Acquire);
        let mut last_failure = self.init.lock().await;

        if let Some(backend) = self.ready.get() {
            return Ok(Arc::clone(backend));
        }
        if let Some(failure) = last_failure.as_ref() {
            if failure.seq > failures_seen {
                // The attempt we queued behind failed; don't dial again.
                return Err(failure.error.clone());
            }
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        debug!("dialing key-value backend");
        match self.dialer.dial().await {
            Ok(backend) => {
                // Only the lock holder sets the cell, so this cannot race.
                let _ = self.ready.set(Arc::clone(&backend));
                *last_failure = None;
                info!("connection pool ready");
                Ok(backend)
            }
            Err(error) => {
                let seq = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
                warn!(error = %error, attempt = seq, "connection pool initialization failed");
                *last_failure = Some(InitFailure {
                    seq,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Checks out a connection, dialing first if needed.
    ///
    /// The connection goes back to the pool when the returned box is dropped,
    /// including when the awaiting future is cancelled.
    pub async fn acquire(&self) -> Result<Box<dyn Connection>, StoreError> {
        let backend = self.backend().await?;
        tokio::time::timeout(self.checkout_timeout, backend.checkout())
            .await
            .map_err(|_| StoreError::Timeout(self.checkout_timeout))?
    }

    /// Closes the pool. Only the first call does any work.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("connection pool already shut down");
            return;
        }
        // Let an in-flight dial finish so its connections get closed too.
        let _guard = self.init.lock().await;
        if let Some(backend) = self.ready.get() {
            backend.close().await;
        }
        info!("connection pool shut down");
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("state", &self.state())
            .field("checkout_timeout", &self.checkout_timeout)
            .finish()
    }
}
