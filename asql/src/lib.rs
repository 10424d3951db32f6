//!
//! asql - Asynchronous SQL Connector
//!
//! Lets a single-threaded script host run SQL without blocking. Every
//! `Connection` owns one worker thread that serializes all work on its native
//! handle; results come back as callbacks posted to the caller's `EventPump`.
//!
//! Modules:
//! - `connection`: the connection handle and its worker-side state
//! - `query`: the reconnect-and-retry state machine
//! - `cursor`: the single open result per connection
//! - `registry`: live connections and the `reset()` barrier
//! - `library`: reference-counted driver library setup
//! - `bindings`: the script-facing class and method dispatch
//! - `config`: `asql.toml` loading
//!

pub mod bindings;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod errors;
pub mod library;
pub mod query;
pub mod registry;

pub use bindings::{ConnectionClass, METHODS};
pub use config::Config;
pub use connection::{Connection, ConnectionId, WorkerOptions};
pub use errors::{ConfigError, ConnectorError};
pub use library::LibraryContext;
pub use registry::Registry;
