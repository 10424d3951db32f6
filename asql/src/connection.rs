///
/// # Connection
///
/// A `Connection` is the script-facing handle. Everything that touches the
/// native database handle happens on the connection's own `TaskThread`, whose
/// worker-side state is a `Backend`:
///
/// - the native `Session` (opened by the init task, not by the caller),
/// - the single open result `Cursor`,
/// - the `LiveGuard` that keeps the registry's live count up until the
///   worker has dropped everything.
///
/// Callers never block. Each operation validates on the calling thread,
/// queues one task and returns; results come back through callbacks posted
/// to the caller's `EventPump`.
///
/// ## Closing
///
/// `close()` is idempotent. It deregisters the connection at once (later
/// operations fail synchronously with `ConnectorError::Closed`), then queues
/// the cleanup task followed by quit. Work queued before `close()` still
/// runs. When the worker exits it drops the `Backend`, which releases the
/// live count and signals the registry.
///

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use asql_std_core::{
    panic_message, text, Completion, ConnectOptions, DriverError, ScriptFunction, ScriptValue,
    Session,
};
use asql_std_threads::TaskThread;

use crate::cursor::Cursor;
use crate::errors::ConnectorError;
use crate::library::LibraryContext;
use crate::query::run_query;
use crate::registry::{LiveGuard, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Maximum reconnect-and-retry rounds per query; `None` retries until
    /// success or a hard failure.
    pub retry_limit: Option<u32>,
    pub thread_name_prefix: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            retry_limit: None,
            thread_name_prefix: "asql-conn".to_string(),
        }
    }
}

/// Worker-side state of one connection. Only its `TaskThread` touches it.
pub(crate) struct Backend {
    id: ConnectionId,
    options: ConnectOptions,
    library: Arc<LibraryContext>,
    library_held: bool,
    session: Option<Box<dyn Session>>,
    cursor: Cursor,
    retry_limit: Option<u32>,
    _live: LiveGuard,
}

impl Backend {
    fn init(&mut self, on_open: Option<Completion>) {
        self.library.acquire();
        self.library_held = true;

        let result = self.library.driver().connect(&self.options);
        let reply = match result {
            Ok(session) => {
                tracing::debug!(connection = %self.id, "native handle opened");
                self.session = Some(session);
                ScriptValue::Null
            }
            Err(err) => {
                tracing::warn!(connection = %self.id, error = %err, "open failed, will retry on first query");
                ScriptValue::String(err.message())
            }
        };
        if let Some(completion) = on_open {
            completion.complete(vec![reply]);
        }
    }

    fn session(&mut self) -> Result<&mut Box<dyn Session>, DriverError> {
        if self.session.is_none() {
            self.session = Some(self.library.driver().connect(&self.options)?);
        }
        self.session.as_mut().ok_or(DriverError::NotConnected)
    }

    fn query(&mut self, sql: &str, completion: Option<Completion>) {
        self.cursor.close();

        let retry_limit = self.retry_limit;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.session()
                .and_then(|session| run_query(session.as_mut(), sql, retry_limit))
        }))
        .unwrap_or_else(|payload| {
            // The handle may be half-used; reconnect on the next query.
            self.session = None;
            Err(DriverError::Panicked(panic_message(payload.as_ref())))
        });

        match outcome {
            Ok(stream) => {
                let field_count = self.cursor.open(stream);
                tracing::debug!(connection = %self.id, field_count, "query succeeded");
                if let Some(completion) = completion {
                    completion.complete(vec![ScriptValue::Null, field_count.into()]);
                }
            }
            Err(err) => {
                tracing::debug!(connection = %self.id, error = %err, "query failed");
                if let Some(completion) = completion {
                    completion.complete(vec![ScriptValue::String(err.message())]);
                }
            }
        }
    }

    fn fetch(&mut self, completion: Completion) {
        let row = panic::catch_unwind(AssertUnwindSafe(|| self.cursor.fetch())).unwrap_or_else(|payload| {
            tracing::warn!(connection = %self.id, panic = %panic_message(payload.as_ref()), "row fetch panicked, closing result");
            self.cursor.close();
            None
        });
        let reply = match row {
            Some(row) => text::row_to_host(&row),
            None => ScriptValue::Null,
        };
        completion.complete(vec![reply]);
    }

    fn control(&mut self, name: &str, op: fn(&mut dyn Session) -> Result<(), DriverError>) {
        let Some(session) = self.session.as_mut() else {
            tracing::warn!(connection = %self.id, op = name, "no native handle");
            return;
        };
        if let Err(err) = op(session.as_mut()) {
            tracing::warn!(connection = %self.id, op = name, error = %err, "control operation failed");
        }
    }

    fn cleanup(&mut self) {
        self.cursor.close();
        self.session = None;
        if self.library_held {
            self.library_held = false;
            self.library.release();
        }
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// State shared between the script handle and the registry.
pub(crate) struct ConnectionShared {
    id: ConnectionId,
    thread: Mutex<Option<TaskThread<Backend>>>,
}

impl ConnectionShared {
    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.thread.lock().unwrap().is_none()
    }

    /// Post `task` to the worker, failing if the connection is closed.
    fn post<F>(&self, task: F) -> Result<(), ConnectorError>
    where
        F: FnOnce(&mut Backend) + Send + 'static,
    {
        let thread = self.thread.lock().unwrap();
        let Some(thread) = thread.as_ref() else {
            return Err(ConnectorError::Closed);
        };
        if thread.post(task) {
            Ok(())
        } else {
            Err(ConnectorError::Closed)
        }
    }

    /// Queue cleanup and quit. Returns false if already shut down.
    pub(crate) fn shutdown(&self, registry: &Registry) -> bool {
        let Some(mut thread) = self.thread.lock().unwrap().take() else {
            return false;
        };
        thread.post(Backend::cleanup);
        thread.post_quit();
        if let Some(handle) = thread.take_handle() {
            registry.retire(handle);
        }
        tracing::debug!(connection = %self.id, "close requested");
        true
    }
}

pub struct Connection {
    shared: Arc<ConnectionShared>,
    registry: Arc<Registry>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Register a new connection and start its worker. The native handle is
    /// opened by the worker; `on_open`, if given, receives `(null)` or
    /// `(errorMessage)` once that has happened.
    ///
    /// Reporting the open outcome is an extension: hosts written against the
    /// plain five-argument constructor never see it, and a failed open is not
    /// fatal either way. The next query retries the connect.
    pub fn open(
        registry: &Arc<Registry>,
        library: &Arc<LibraryContext>,
        options: ConnectOptions,
        worker: &WorkerOptions,
        on_open: Option<ScriptFunction>,
    ) -> Result<Connection, ConnectorError> {
        let id = registry.next_id();
        let backend = Backend {
            id,
            options,
            library: Arc::clone(library),
            library_held: false,
            session: None,
            cursor: Cursor::new(),
            retry_limit: worker.retry_limit,
            _live: registry.live_guard(id),
        };

        let thread = TaskThread::spawn(format!("{}-{}", worker.thread_name_prefix, id), backend)?;
        let on_open = on_open.map(Completion::capture);
        thread.post(move |backend| backend.init(on_open));

        let shared = Arc::new(ConnectionShared {
            id,
            thread: Mutex::new(Some(thread)),
        });
        registry.attach(Arc::clone(&shared));
        tracing::debug!(connection = %id, "connection registered");

        Ok(Connection {
            shared,
            registry: Arc::clone(registry),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn close(&self) {
        if self.is_closed() {
            return;
        }
        self.registry.detach(self.shared.id);
        self.shared.shutdown(&self.registry);
    }

    /// Start a transaction. Failures are logged, not reported.
    pub fn ready(&self) {
        let _ = self
            .shared
            .post(|backend| backend.control("ready", |s| s.begin()));
    }

    pub fn commit(&self) {
        let _ = self
            .shared
            .post(|backend| backend.control("commit", |s| s.commit()));
    }

    pub fn rollback(&self) {
        let _ = self
            .shared
            .post(|backend| backend.control("rollback", |s| s.rollback()));
    }

    /// Execute `sql`, replacing any open result. `callback` receives
    /// `(null, fieldCount)` or `(errorMessage)`; without a callback errors are
    /// dropped.
    pub fn query(&self, sql: &str, callback: Option<ScriptFunction>) -> Result<(), ConnectorError> {
        if self.is_closed() {
            return Err(ConnectorError::Closed);
        }
        let completion = callback.map(Completion::capture);
        let sql = sql.to_string();
        self.shared.post(move |backend| backend.query(&sql, completion))
    }

    /// Fetch the next row of the open result. `callback` receives an array of
    /// column strings, or `null` at the end. No-op without a callback.
    pub fn fetch(&self, callback: Option<ScriptFunction>) -> Result<(), ConnectorError> {
        if self.is_closed() {
            return Err(ConnectorError::Closed);
        }
        let Some(callback) = callback else {
            return Ok(());
        };
        let completion = Completion::capture(callback);
        self.shared.post(move |backend| backend.fetch(completion))
    }

    pub fn close_result(&self) -> Result<(), ConnectorError> {
        self.shared.post(|backend| backend.cursor.close())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
