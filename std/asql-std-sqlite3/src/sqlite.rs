///
/// SQLite driver implementation.
///
/// `database` in the connect options is the file path. A missing or empty
/// path, or ":memory:", opens a private in-memory database. Host, user,
/// password and port have no meaning for SQLite and are ignored.
///

use std::collections::VecDeque;
use std::time::Duration;

use asql_std_core::{ConnectOptions, Driver, DriverError, ResultStream, Row, Session};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn sqlite_error_code(e: &rusqlite::Error) -> i32 {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => err.extended_code,
        _ => -1,
    }
}

fn classify_error(e: rusqlite::Error) -> DriverError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::SystemIoFailure | ErrorCode::CannotOpen) =>
        {
            DriverError::ConnectionLost(e.to_string())
        }
        _ => DriverError::Database {
            code: sqlite_error_code(&e),
            message: e.to_string(),
        },
    }
}

fn column_bytes(value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
        ValueRef::Real(f) => Some(f.to_string().into_bytes()),
        ValueRef::Text(t) => Some(t.to_vec()),
        ValueRef::Blob(b) => Some(b.to_vec()),
    }
}

#[derive(Debug, Clone)]
pub struct SqliteDriver {
    busy_timeout: Duration,
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite3"
    }

    fn library_init(&self) {
        // sqlite3_initialize is idempotent and thread-safe.
        let rc = unsafe { rusqlite::ffi::sqlite3_initialize() };
        tracing::debug!(rc, version = rusqlite::version(), "sqlite library initialized");
    }

    fn library_end(&self) {
        // sqlite3_shutdown must not run while any other connection in the
        // process is open, so the library stays initialized.
        tracing::debug!("sqlite library context released");
    }

    fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Session>, DriverError> {
        if options.host.is_some() || options.user.is_some() || options.password.is_some() {
            tracing::debug!(
                host = options.host.as_deref().unwrap_or(""),
                user = options.user.as_deref().unwrap_or(""),
                "ignoring network credentials for sqlite"
            );
        }
        let path = options
            .database
            .clone()
            .filter(|p| !p.is_empty() && p != ":memory:");
        let mut session = SqliteSession {
            path,
            busy_timeout: self.busy_timeout,
            conn: None,
        };
        session.open().map_err(|e| DriverError::Connect(e.to_string()))?;
        Ok(Box::new(session))
    }
}

pub struct SqliteSession {
    path: Option<String>,
    busy_timeout: Duration,
    conn: Option<Connection>,
}

impl SqliteSession {
    fn open(&mut self) -> Result<(), rusqlite::Error> {
        self.conn = None;
        let conn = match &self.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA encoding = 'UTF-8'")?;
        self.conn = Some(conn);
        Ok(())
    }

    fn conn(&self) -> Result<&Connection, DriverError> {
        self.conn.as_ref().ok_or(DriverError::NotConnected)
    }

    fn exec_batch(&self, sql: &str) -> Result<(), DriverError> {
        self.conn()?.execute_batch(sql).map_err(classify_error)
    }
}

impl Session for SqliteSession {
    fn execute(&mut self, sql: &str) -> Result<Box<dyn ResultStream>, DriverError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(classify_error)?;
        let field_count = stmt.column_count();

        let mut rows = stmt.query([]).map_err(classify_error)?;
        let mut buffered = VecDeque::new();
        while let Some(row) = rows.next().map_err(classify_error)? {
            let mut values: Row = Vec::with_capacity(field_count);
            for i in 0..field_count {
                let value = row.get_ref(i).map_err(classify_error)?;
                values.push(column_bytes(value));
            }
            buffered.push_back(values);
        }

        Ok(Box::new(SqliteRows {
            field_count,
            rows: buffered,
        }))
    }

    fn reconnect(&mut self) -> Result<(), DriverError> {
        tracing::debug!(path = self.path.as_deref().unwrap_or(":memory:"), "reopening sqlite database");
        self.open().map_err(|e| DriverError::Connect(e.to_string()))
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.exec_batch("BEGIN")
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.exec_batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.exec_batch("ROLLBACK")
    }
}

pub struct SqliteRows {
    field_count: usize,
    rows: VecDeque<Row>,
}

impl ResultStream for SqliteRows {
    fn field_count(&self) -> usize {
        self.field_count
    }

    fn next_row(&mut self) -> Result<Option<Row>, DriverError> {
        Ok(self.rows.pop_front())
    }
}
