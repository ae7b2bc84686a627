//! Service configuration
//!
//! Loaded from a YAML file with one section per subsystem. Every field has a
//! default, so a partial file (or none at all) yields a runnable local setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheConfig, DEFAULT_CAPACITY};
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub ops: OpsConfig,
    pub postgres: PostgresConfig,
    pub ingest: IngestConfig,
    pub cache: CacheSettings,
}

/// Read API listener. Timeouts are in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout: u64,
    pub read_timeout: u64,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 10,
            read_timeout: 5,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }
}

/// Health probes and Prometheus scrape endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpsConfig {
    pub addr: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_size: usize,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "orders".to_string(),
            pool_size: 16,
        }
    }
}

/// Ingestion loop settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Directory the upstream producer drops order files into
    pub spool_dir: PathBuf,
    /// Delay between drains of the source, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            spool_dir: PathBuf::from("./spool"),
            poll_interval_ms: 1000,
        }
    }
}

impl IngestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Cache sizing and expiry.
///
/// `ttl` is a bare number whose unit depends on the server mode: seconds when
/// `server.debug` is set, hours otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl: u64,
    /// Seconds between sweeps of expired entries
    pub purge_interval: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: 24,
            purge_interval: 60,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self, debug: bool) -> Duration {
        if debug {
            Duration::from_secs(self.ttl)
        } else {
            Duration::from_secs(self.ttl.saturating_mul(3600))
        }
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval)
    }

    pub fn cache_config(&self, debug: bool) -> CacheConfig {
        CacheConfig::new(self.capacity, self.ttl(debug))
    }
}

impl Config {
    /// Read, parse and validate a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.cache_config(self.server.debug).validate()?;
        if self.cache.purge_interval == 0 {
            return Err(Error::Config("cache.purge_interval must be > 0".into()));
        }
        if self.ingest.poll_interval_ms == 0 {
            return Err(Error::Config("ingest.poll_interval_ms must be > 0".into()));
        }
        if self.postgres.pool_size == 0 {
            return Err(Error::Config("postgres.pool_size must be > 0".into()));
        }
        if self.server.host.trim().is_empty() {
            return Err(Error::Config("server.host must not be empty".into()));
        }
        Ok(())
    }
}
