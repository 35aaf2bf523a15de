//! Configuration Module
//!
//! Loads server, backend, and bootstrap-user settings from an optional TOML
//! file, then applies environment variable overrides on top.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub farmer: FarmerConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// HTTP server port
    pub port: u16,
    /// Pause before answering a successful animal lookup, in milliseconds
    pub lookup_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            lookup_delay_ms: 5000,
        }
    }
}

impl ServerConfig {
    pub fn lookup_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_delay_ms)
    }
}

/// Key-value backend connection settings.
///
/// The older key names `minsize`, `maxsize`, `use_ssl` and `ssl_cert` are
/// accepted as aliases. Unknown keys are an error.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    /// Connections opened eagerly when the pool is first dialed
    #[serde(alias = "minsize")]
    pub min_size: usize,
    /// Upper bound on pooled connections
    #[serde(alias = "maxsize")]
    pub max_size: usize,
    pub password: Option<String>,
    /// Connect with TLS (`rediss://`)
    #[serde(alias = "use_ssl")]
    pub use_tls: bool,
    /// PEM file holding the client certificate chain and its private key.
    /// Only read when `use_tls` is set.
    #[serde(alias = "ssl_cert")]
    pub tls_cert: Option<PathBuf>,
    /// Skip certificate verification when `use_tls` is set
    pub tls_insecure: bool,
    /// Bound on checkout, connect, and command round trips, in milliseconds
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            min_size: 1,
            max_size: 10,
            password: None,
            use_tls: false,
            tls_cert: None,
            tls_insecure: false,
            timeout_ms: 5000,
        }
    }
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Connection URL understood by the redis client.
    ///
    /// The password is percent-encoded into the userinfo part. The
    /// `#insecure` fragment disables certificate checks for TLS.
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "rediss" } else { "redis" };
        let auth = match &self.password {
            Some(password) => format!(":{}@", urlencoding::encode(password)),
            None => String::new(),
        };
        let fragment = if self.use_tls && self.tls_insecure {
            "#insecure"
        } else {
            ""
        };
        format!(
            "{}://{}{}:{}/{}{}",
            scheme, auth, self.host, self.port, self.db, fragment
        )
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("use_tls", &self.use_tls)
            .field("tls_cert", &self.tls_cert)
            .field("tls_insecure", &self.tls_insecure)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Bootstrap administrator settings.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FarmerConfig {
    pub password: String,
}

impl Default for FarmerConfig {
    fn default() -> Self {
        Self {
            password: "12345".to_string(),
        }
    }
}

impl std::fmt::Debug for FarmerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FarmerConfig")
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Loads configuration from `path` when given, then applies environment
    /// overrides and validates the result.
    ///
    /// # Environment Variables
    /// - `ANIMALS_HOST`, `ANIMALS_PORT`, `ANIMALS_LOOKUP_DELAY_MS`
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_MIN_SIZE`,
    ///   `REDIS_MAX_SIZE`, `REDIS_USE_TLS`, `REDIS_TLS_CERT`
    /// - `FARMER_PASSWORD`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML file. Missing sections and keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn apply_env(&mut self) {
        override_from_env("ANIMALS_HOST", &mut self.server.host);
        override_from_env("ANIMALS_PORT", &mut self.server.port);
        override_from_env("ANIMALS_LOOKUP_DELAY_MS", &mut self.server.lookup_delay_ms);
        override_from_env("REDIS_HOST", &mut self.redis.host);
        override_from_env("REDIS_PORT", &mut self.redis.port);
        override_from_env("REDIS_MIN_SIZE", &mut self.redis.min_size);
        override_from_env("REDIS_MAX_SIZE", &mut self.redis.max_size);
        override_from_env("REDIS_USE_TLS", &mut self.redis.use_tls);
        if let Some(path) = env::var_os("REDIS_TLS_CERT") {
            self.redis.tls_cert = Some(PathBuf::from(path));
        }
        if let Ok(password) = env::var("REDIS_PASSWORD") {
            self.redis.password = Some(password);
        }
        override_from_env("FARMER_PASSWORD", &mut self.farmer.password);
    }

    /// Rejects pool bounds the backend pool cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis.max_size == 0 {
            return Err(ConfigError::Invalid(
                "redis.max_size must be at least 1".to_string(),
            ));
        }
        if self.redis.min_size > self.redis.max_size {
            return Err(ConfigError::Invalid(format!(
                "redis.min_size ({}) exceeds redis.max_size ({})",
                self.redis.min_size, self.redis.max_size
            )));
        }
        Ok(())
    }
}

/// Replaces `slot` with the parsed value of `key` when it is set and valid.
fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    if let Some(value) = env::var(key).ok().and_then(|v| v.parse().ok()) {
        *slot = value;
    }
}
