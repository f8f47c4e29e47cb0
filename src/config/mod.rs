//! Configuration management
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `config/powerbill.toml`, then `POWERBILL__*` environment variables
//! (`POWERBILL__SERVER__PORT=9000`, `POWERBILL__STORAGE=postgres`).

use crate::domain::auth::ApiKeyEntry;
use crate::domain::query::FilterDefaults;
use crate::domain::tariff::TariffTable;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "config/powerbill";
pub const ENV_PREFIX: &str = "POWERBILL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub billing: BillingConfig,
    pub auth: AuthConfig,
    pub storage: StorageBackend,
    /// Fallback filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            billing: BillingConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageBackend::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/powerbill".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 5,
            idle_timeout_secs: 600,      // 10 minutes
            max_lifetime_secs: 1800,     // 30 minutes
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub tariff: TariffTable,
    pub filters: FilterDefaults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_keys: Vec<ApiKeyEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl Config {
    /// Load from the default file location and the environment
    pub fn load() -> Result<Self, ::config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load with `path` (extension optional) as the file layer
    pub fn load_from(path: &str) -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()
    }
}
