///
/// Driver library context.
///
/// Client libraries often need process-wide setup before the first handle is
/// opened and teardown after the last one closes. `LibraryContext` counts the
/// connections currently holding the library: the first `acquire()` calls
/// `Driver::library_init`, the last `release()` calls `Driver::library_end`.
///
/// Acquire and release always run on a connection's worker thread (inside its
/// init and close tasks), never on the caller's thread.
///

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use asql_std_core::Driver;

pub struct LibraryContext {
    driver: Arc<dyn Driver>,
    refs: AtomicUsize,
}

impl fmt::Debug for LibraryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryContext")
            .field("driver", &self.driver.name())
            .field("refs", &self.active())
            .finish()
    }
}

impl LibraryContext {
    pub fn new(driver: Arc<dyn Driver>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            refs: AtomicUsize::new(0),
        })
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Connections currently holding the library.
    pub fn active(&self) -> usize {
        self.refs.load(Ordering::SeqCst)
    }

    pub(crate) fn acquire(&self) {
        if self.refs.fetch_add(1, Ordering::SeqCst) == 0 {
            tracing::debug!(driver = self.driver.name(), "initializing client library");
            self.driver.library_init();
        }
    }

    pub(crate) fn release(&self) {
        if self.refs.fetch_sub(1, Ordering::SeqCst) == 1 {
            tracing::debug!(driver = self.driver.name(), "tearing down client library");
            self.driver.library_end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asql_std_core::{ConnectOptions, DriverError, Session};

    #[derive(Default)]
    struct CountingDriver {
        inits: AtomicUsize,
        ends: AtomicUsize,
    }

    impl Driver for CountingDriver {
        fn name(&self) -> &str {
            "counting"
        }

        fn library_init(&self) {
            self.inits.fetch_add(1, Ordering::SeqCst);
        }

        fn library_end(&self) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }

        fn connect(&self, _: &ConnectOptions) -> Result<Box<dyn Session>, DriverError> {
            Err(DriverError::Connect("unused".to_string()))
        }
    }

    #[test]
    fn test_init_on_first_and_end_on_last() {
        let driver = Arc::new(CountingDriver::default());
        let library = LibraryContext::new(driver.clone());

        library.acquire();
        library.acquire();
        assert_eq!(library.active(), 2);
        assert_eq!(driver.inits.load(Ordering::SeqCst), 1);

        library.release();
        assert_eq!(driver.ends.load(Ordering::SeqCst), 0);
        library.release();
        assert_eq!(driver.ends.load(Ordering::SeqCst), 1);
        assert_eq!(library.active(), 0);

        library.acquire();
        assert_eq!(driver.inits.load(Ordering::SeqCst), 2);
        library.release();
    }
}
