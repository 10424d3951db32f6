//!
//! Script Errors and the Process-wide Error Sink
//!
//! `ScriptError` is what native operations raise back into script code.
//! Errors that cannot be raised synchronously (a callback that throws while
//! being invoked from the event pump) are routed to the error sink instead.
//!
//! The sink consults an optional listener first. A listener returning `true`
//! has handled the error; otherwise it is logged at `error` level.
//!

use std::sync::{Arc, RwLock};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("TypeError: {0}")]
    Type(String),

    #[error("{0}")]
    Usage(String),

    #[error("Uncaught: {0}")]
    Thrown(String),

    #[error("native panic: {0}")]
    Panic(String),
}

type Listener = dyn Fn(&ScriptError) -> bool + Send + Sync;

static ERROR_LISTENER: RwLock<Option<Arc<Listener>>> = RwLock::new(None);

/// Install the process-wide error listener, replacing any previous one.
pub fn set_error_listener<F>(listener: F)
where
    F: Fn(&ScriptError) -> bool + Send + Sync + 'static,
{
    *ERROR_LISTENER.write().unwrap() = Some(Arc::new(listener));
}

pub fn clear_error_listener() {
    *ERROR_LISTENER.write().unwrap() = None;
}

/// Report an error that has no script frame to propagate into.
pub fn fire_error(err: ScriptError) {
    let listener = ERROR_LISTENER.read().unwrap().clone();
    let handled = listener.map(|l| l(&err)).unwrap_or(false);
    if !handled {
        tracing::error!(error = %err, "unhandled script error");
    }
}

#[cfg(test)]
pub(crate) static LISTENER_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
