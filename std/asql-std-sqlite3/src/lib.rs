///
/// asql SQLite3 Driver
///
/// Implements the asql native driver traits on top of rusqlite with bundled
/// SQLite, so no system library is required.
///
/// Architecture:
/// - `SqliteDriver` opens one `SqliteSession` per connection. The session owns
///   the rusqlite `Connection` and is only ever touched by the connection's
///   worker thread.
/// - Query results are materialized when the statement runs, because
///   rusqlite's `Rows` borrow the connection. The returned stream then hands
///   rows out one at a time.
/// - I/O and cannot-open failures are reported as connection loss so the
///   connector reopens the file and retries; every other failure is final and
///   carries SQLite's extended result code.
///

pub mod sqlite;

pub use sqlite::*;
