///
/// Query execution state machine.
///
/// ```text
/// Idle -> Executing(0) -> Succeeded(stream)
///              |
///              | ConnectionLost: reconnect
///              v
///         Executing(1) -> ... -> Failed(error)
/// ```
///
/// A retryable failure reconnects and executes again. A failed reconnect, a
/// hard database error, or exceeding `retry_limit` (when one is configured)
/// ends in `Failed`. With no limit the loop only stops on success or a hard
/// failure.
///

use std::fmt;

use asql_std_core::{DriverError, ResultStream, Session};

pub enum QueryState {
    Idle,
    Executing { attempt: u32 },
    Succeeded(Box<dyn ResultStream>),
    Failed(DriverError),
}

impl fmt::Debug for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryState::Idle => write!(f, "Idle"),
            QueryState::Executing { attempt } => write!(f, "Executing({attempt})"),
            QueryState::Succeeded(stream) => write!(f, "Succeeded({} fields)", stream.field_count()),
            QueryState::Failed(err) => write!(f, "Failed({err})"),
        }
    }
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Succeeded(_) | QueryState::Failed(_))
    }

    /// Advance one transition. Terminal states are returned unchanged.
    pub fn step(self, session: &mut dyn Session, sql: &str, retry_limit: Option<u32>) -> QueryState {
        match self {
            QueryState::Idle => QueryState::Executing { attempt: 0 },
            QueryState::Executing { attempt } => match session.execute(sql) {
                Ok(stream) => QueryState::Succeeded(stream),
                Err(err) if err.is_retryable() => {
                    if retry_limit.is_some_and(|limit| attempt >= limit) {
                        tracing::warn!(attempt, error = %err, "retry limit reached");
                        return QueryState::Failed(err);
                    }
                    tracing::warn!(attempt, error = %err, "connection lost, reconnecting");
                    match session.reconnect() {
                        Ok(()) => QueryState::Executing { attempt: attempt + 1 },
                        Err(err) => QueryState::Failed(err),
                    }
                }
                Err(err) => QueryState::Failed(err),
            },
            terminal => terminal,
        }
    }
}

/// Run `sql` to completion on `session`.
pub fn run_query(
    session: &mut dyn Session,
    sql: &str,
    retry_limit: Option<u32>,
) -> Result<Box<dyn ResultStream>, DriverError> {
    let mut state = QueryState::Idle;
    loop {
        state = match state.step(session, sql, retry_limit) {
            QueryState::Succeeded(stream) => return Ok(stream),
            QueryState::Failed(err) => return Err(err),
            next => next,
        };
    }
}
