///
/// Connector error types.
///
/// `ConnectorError` covers usage errors raised synchronously on the calling
/// thread. Database failures never appear here: they travel to the query
/// callback instead. `ConfigError` covers loading `asql.toml`.
///

use std::path::PathBuf;

use asql_std_core::ScriptError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("DB already closed")]
    Closed,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<ConnectorError> for ScriptError {
    fn from(err: ConnectorError) -> Self {
        ScriptError::Usage(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
