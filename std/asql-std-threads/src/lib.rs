//!
//! asql-std-threads - Worker Threads
//!
//! Every connection owns exactly one `TaskThread`. All operations on the
//! connection's native handle are queued here and executed strictly in
//! submission order, which is the only thing keeping two threads off the
//! same handle.
//!

pub mod task_thread;

pub use task_thread::*;
