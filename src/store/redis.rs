//! Redis backend
//!
//! Dials a `deadpool-redis` pool from `RedisConfig`, warms it to the
//! configured minimum size, and runs single commands on pooled connections.
//! With TLS on and a certificate file configured, the client presents that
//! certificate chain to the server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ::redis::{ClientTlsConfig, ConnectionInfo, IntoConnectionInfo, TlsCertificates};
use deadpool_redis::{Manager, Pool, PoolConfig, Runtime};
use tracing::{debug, info, warn};

use crate::config::RedisConfig;
use crate::error::StoreError;
use crate::store::{Backend, Command, Connection, Dialer, Reply};

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        match err {
            deadpool_redis::PoolError::Closed => StoreError::Closed,
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

// == Redis Dialer ==
/// Builds the Redis pool on first use.
#[derive(Debug, Clone)]
pub struct RedisDialer {
    config: RedisConfig,
}

impl RedisDialer {
    pub fn new(config: RedisConfig) -> Self {
        Self { config }
    }

    /// Where and how to connect. Reads the certificate file when TLS is on
    /// and one is configured.
    async fn connection_info(&self) -> Result<ConnectionInfo, StoreError> {
        let url = self.config.url();
        let cert = match &self.config.tls_cert {
            Some(path) if self.config.use_tls => path,
            _ => return Ok(url.as_str().into_connection_info()?),
        };

        let pem = tokio::fs::read(cert).await.map_err(|e| {
            StoreError::Unavailable(format!(
                "cannot read TLS certificate {}: {e}",
                cert.display()
            ))
        })?;
        // One PEM file carries both the chain and its key.
        let client = ::redis::Client::build_with_tls(
            url.as_str(),
            TlsCertificates {
                client_tls: Some(ClientTlsConfig {
                    client_cert: pem.clone(),
                    client_key: pem,
                }),
                root_cert: None,
            },
        )?;
        debug!(cert = %cert.display(), "loaded redis client certificate");
        Ok(client.get_connection_info().clone())
    }
}

#[async_trait]
impl Dialer for RedisDialer {
    async fn dial(&self) -> Result<Arc<dyn Backend>, StoreError> {
        let timeout = self.config.timeout();
        let mut pool_config = PoolConfig::new(self.config.max_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let manager = Manager::new(self.connection_info().await?)?;
        let pool = Pool::builder(manager)
            .config(pool_config)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("invalid redis settings: {e}")))?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            min_size = self.config.min_size,
            max_size = self.config.max_size,
            tls = self.config.use_tls,
            client_cert = self.config.use_tls && self.config.tls_cert.is_some(),
            "connecting to redis"
        );

        // Opening the first connection proves host, auth, and TLS are usable.
        let warm = self.config.min_size.max(1);
        let mut opened = Vec::with_capacity(warm);
        for _ in 0..warm {
            let mut conn = pool.get().await?;
            if opened.is_empty() {
                let _: () = ::redis::cmd("PING").query_async(&mut conn).await?;
            }
            opened.push(conn);
        }
        drop(opened);
        debug!(idle = pool.status().available, "redis pool warmed");

        Ok(Arc::new(RedisBackend {
            pool,
            command_timeout: timeout,
        }))
    }
}

// == Redis Backend ==
struct RedisBackend {
    pool: Pool,
    command_timeout: Duration,
}

#[async_trait]
impl Backend for RedisBackend {
    async fn checkout(&self) -> Result<Box<dyn Connection>, StoreError> {
        let conn = self.pool.get().await?;
        Ok(Box::new(RedisConnection {
            conn,
            command_timeout: self.command_timeout,
        }))
    }

    async fn close(&self) {
        self.pool.close();
        let drained = tokio::time::timeout(self.command_timeout, async {
            while self.pool.status().size > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = self.pool.status().size,
                "redis pool closed before all connections returned"
            );
        }
    }
}

/// A pooled Redis connection; returns to the pool on drop.
struct RedisConnection {
    conn: deadpool_redis::Connection,
    command_timeout: Duration,
}

impl RedisConnection {
    fn build(command: &Command) -> ::redis::Cmd {
        let mut cmd = ::redis::cmd(command.name());
        match command {
            Command::Get { key } => {
                cmd.arg(key);
            }
            Command::Set { key, value } => {
                cmd.arg(key).arg(value.as_slice());
            }
            Command::HGet { key, field } => {
                cmd.arg(key).arg(field);
            }
            Command::HMSet { key, fields } => {
                cmd.arg(key);
                for (field, value) in fields {
                    cmd.arg(field).arg(value.as_slice());
                }
            }
        }
        cmd
    }
}

#[async_trait]
impl Connection for RedisConnection {
    async fn execute(&mut self, command: &Command) -> Result<Reply, StoreError> {
        let cmd = Self::build(command);
        let round_trip = async {
            match command {
                Command::Get { .. } | Command::HGet { .. } => {
                    let value: Option<Vec<u8>> = cmd.query_async(&mut self.conn).await?;
                    Ok::<Reply, StoreError>(value)
                }
                Command::Set { .. } | Command::HMSet { .. } => {
                    let _: () = cmd.query_async(&mut self.conn).await?;
                    Ok::<Reply, StoreError>(None)
                }
            }
        };
        tokio::time::timeout(self.command_timeout, round_trip)
            .await
            .map_err(|_| StoreError::Timeout(self.command_timeout))?
    }
}
