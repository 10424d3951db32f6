//!
//! asql-std-core - Host Boundary Types
//!
//! This crate provides the pieces every other asql crate shares:
//!
//! - `ScriptValue` / `ScriptFunction` and typed argument helpers
//! - `ScriptError` plus the process-wide error sink
//! - `EventPump`, the per-thread origin queue completions are posted to
//! - `Callback` / `Completion` for single-shot cross-thread callbacks
//! - The text adapter and the native `Driver` traits
//!

pub mod value;
pub mod exception;
pub mod pump;
pub mod callback;
pub mod text;
pub mod driver;

pub use value::*;
pub use exception::*;
pub use pump::*;
pub use callback::*;
pub use driver::*;
