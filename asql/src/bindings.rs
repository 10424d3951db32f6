///
/// Script bindings for the connection class.
///
/// The host engine resolves `new Connection(host, user, password, database,
/// port, onOpen?)` to `ConnectionClass::construct` and every method call on
/// the resulting object to `ConnectionClass::call`. Arguments are checked on
/// the calling thread before any work is queued, so type errors surface
/// synchronously.
///
/// Methods:
/// - close()
/// - ready()
/// - rollback()
/// - commit()
/// - query(sql, callback?)
/// - fetch(callback)
/// - closeResult()
///

use std::sync::Arc;

use asql_std_core::{arg_function, arg_int, arg_string, ConnectOptions, ScriptError, ScriptValue};

use crate::connection::{Connection, WorkerOptions};
use crate::library::LibraryContext;
use crate::registry::{self, Registry};

pub const METHODS: &[&str] = &[
    "close",
    "ready",
    "rollback",
    "commit",
    "query",
    "fetch",
    "closeResult",
];

#[derive(Clone)]
pub struct ConnectionClass {
    registry: Arc<Registry>,
    library: Arc<LibraryContext>,
    worker: WorkerOptions,
}

impl ConnectionClass {
    pub fn new(registry: Arc<Registry>, library: Arc<LibraryContext>, worker: WorkerOptions) -> Self {
        Self {
            registry,
            library,
            worker,
        }
    }

    /// Class bound to the process-wide registry.
    pub fn global(library: Arc<LibraryContext>, worker: WorkerOptions) -> Self {
        Self::new(Arc::clone(registry::global()), library, worker)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn construct(&self, args: &[ScriptValue]) -> Result<Connection, ScriptError> {
        let options = ConnectOptions {
            host: arg_string(args, 0)?,
            user: arg_string(args, 1)?,
            password: arg_string(args, 2)?,
            database: arg_string(args, 3)?,
            port: arg_int(args, 4)?,
        };
        let on_open = arg_function(args, 5);
        let conn = Connection::open(&self.registry, &self.library, options, &self.worker, on_open)?;
        Ok(conn)
    }

    pub fn call(
        &self,
        conn: &Connection,
        method: &str,
        args: &[ScriptValue],
    ) -> Result<ScriptValue, ScriptError> {
        match method {
            "close" => conn.close(),
            "ready" => conn.ready(),
            "rollback" => conn.rollback(),
            "commit" => conn.commit(),
            "query" => {
                let Some(sql) = args.first().and_then(ScriptValue::as_str) else {
                    return Err(ScriptError::Type("parameter 1: must be string".to_string()));
                };
                conn.query(sql, arg_function(args, 1))?;
            }
            "fetch" => conn.fetch(arg_function(args, 0))?,
            "closeResult" => conn.close_result()?,
            other => {
                return Err(ScriptError::Type(format!("Connection.{other} is not a function")));
            }
        }
        Ok(ScriptValue::Undefined)
    }

    /// Close every connection of this class's registry and wait for them.
    pub fn reset(&self) {
        self.registry.reset();
    }
}

/// Close every connection in the process and wait for their workers.
pub fn reset() {
    registry::global().reset();
}
