///
/// Result cursor.
///
/// Holds the stream of the last successful query on a connection. A cursor
/// may be empty: nothing executed yet, closed, or already exhausted. Fetching
/// from an empty cursor yields `None`, never an error.
///

use asql_std_core::{ResultStream, Row};

#[derive(Default)]
pub struct Cursor {
    stream: Option<Box<dyn ResultStream>>,
    field_count: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is open with `stream`. Returns the field count.
    pub fn open(&mut self, stream: Box<dyn ResultStream>) -> usize {
        self.field_count = stream.field_count();
        self.stream = Some(stream);
        self.field_count
    }

    pub fn close(&mut self) {
        self.stream = None;
        self.field_count = 0;
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Next row, or `None` at the end of the result. The cursor closes itself
    /// once exhausted or when the stream fails.
    pub fn fetch(&mut self) -> Option<Row> {
        let stream = self.stream.as_mut()?;
        match stream.next_row() {
            Ok(Some(row)) => Some(row),
            Ok(None) => {
                self.close();
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "row fetch failed, closing result");
                self.close();
                None
            }
        }
    }
}
