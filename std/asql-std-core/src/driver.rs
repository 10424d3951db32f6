//!
//! Native Driver Boundary
//!
//! The connector never talks to a database client library directly. A
//! `Driver` opens `Session`s (one native handle each); a session executes SQL
//! and hands back a `ResultStream` for the produced rows.
//!
//! Every call happens on the owning connection's worker thread, so the traits
//! only require `Send`.
//!
//! Failures are classified up front: `ConnectionLost` means the handle went
//! away and a reconnect may fix it, everything else is final.
//!

use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub port: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("{message}")]
    Database { code: i32, message: String },

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("not connected")]
    NotConnected,

    #[error("driver panicked: {0}")]
    Panicked(String),
}

impl DriverError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, DriverError::ConnectionLost(_))
    }

    /// Message handed to script callbacks: the native client's own text,
    /// without the variant prefix used by `Display`.
    pub fn message(&self) -> String {
        match self {
            DriverError::ConnectionLost(message) | DriverError::Connect(message) => message.clone(),
            DriverError::Database { message, .. } => message.clone(),
            DriverError::NotConnected | DriverError::Panicked(_) => self.to_string(),
        }
    }
}

/// One row: a value per column, `None` for SQL NULL.
pub type Row = Vec<Option<Vec<u8>>>;

pub trait ResultStream: Send {
    fn field_count(&self) -> usize;

    /// Next row, or `None` once the result is exhausted.
    fn next_row(&mut self) -> Result<Option<Row>, DriverError>;
}

pub trait Session: Send {
    fn execute(&mut self, sql: &str) -> Result<Box<dyn ResultStream>, DriverError>;

    fn reconnect(&mut self) -> Result<(), DriverError>;

    fn begin(&mut self) -> Result<(), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn rollback(&mut self) -> Result<(), DriverError>;
}

pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    /// Called when the first connection of a library context initializes.
    fn library_init(&self) {}

    /// Called when the last connection of a library context closes.
    fn library_end(&self) {}

    fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Session>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_loss_is_retryable() {
        assert!(DriverError::ConnectionLost("gone away".to_string()).is_retryable());
        assert!(!DriverError::Connect("refused".to_string()).is_retryable());
        assert!(!DriverError::NotConnected.is_retryable());
        let err = DriverError::Database {
            code: 1064,
            message: "syntax error".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.message(), "syntax error");
    }

    #[test]
    fn test_callback_message_is_native_text() {
        let lost = DriverError::ConnectionLost("server has gone away".to_string());
        assert_eq!(lost.message(), "server has gone away");
        assert_eq!(lost.to_string(), "connection lost: server has gone away");

        let refused = DriverError::Connect("connection refused".to_string());
        assert_eq!(refused.message(), "connection refused");
        assert_eq!(DriverError::NotConnected.message(), "not connected");
    }
}
