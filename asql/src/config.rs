///
/// # Configuration
///
/// Connector settings live in an `asql.toml` file:
///
/// ```toml
/// [connection]
/// host = "localhost"
/// user = "app"
/// password = "secret"
/// database = "app.db"
/// port = 3306
///
/// [worker]
/// retry_limit = 5              # omit for unbounded reconnect-and-retry
/// thread_name_prefix = "asql-conn"
/// busy_timeout_ms = 5000
///
/// [log]
/// level = "info"
/// ```
///
/// Every section and field is optional. `Config::discover()` looks for
/// `./asql.toml`, then `{config_dir}/asql/asql.toml`, and otherwise falls
/// back to the defaults.
///

use std::path::{Path, PathBuf};
use std::time::Duration;

use asql_std_core::ConnectOptions;
use serde::{Deserialize, Serialize};

use crate::connection::WorkerOptions;
use crate::errors::ConfigError;

pub const CONFIG_FILE_NAME: &str = "asql.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub worker: WorkerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_limit: Option<u32>,
    pub thread_name_prefix: String,
    pub busy_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            retry_limit: None,
            thread_name_prefix: "asql-conn".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load the first config file found, returning it with its path.
    pub fn discover() -> Result<(Config, Option<PathBuf>), ConfigError> {
        for candidate in search_paths() {
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                return Ok((config, Some(candidate)));
            }
        }
        Ok((Config::default(), None))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "worker.thread_name_prefix must not be empty".to_string(),
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        self.log
            .level
            .parse::<tracing::Level>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.log.level)))
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.connection.host.clone(),
            user: self.connection.user.clone(),
            password: self.connection.password.clone(),
            database: self.connection.database.clone(),
            port: self.connection.port,
        }
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            retry_limit: self.worker.retry_limit,
            thread_name_prefix: self.worker.thread_name_prefix.clone(),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.worker.busy_timeout_ms)
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("asql").join(CONFIG_FILE_NAME));
    }
    paths
}
