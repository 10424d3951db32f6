///
/// Connection registry and shutdown barrier.
///
/// The registry tracks two different things:
/// - the set of connections still open (removed the moment `close()` is
///   requested), and
/// - the live count, which only drops once a connection's worker has run its
///   cleanup and released its state.
///
/// `reset()` force-closes everything still registered and then blocks until
/// the live count reaches zero, so no worker outlives it. Worker join handles
/// of closed connections are retained here and joined by `reset()`.
///

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::connection::{ConnectionId, ConnectionShared};

/// Auto-resetting event: `wait` consumes the signal.
struct Event {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl Event {
    fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn set(&self) {
        *self.signaled.lock().unwrap() = true;
        self.condvar.notify_all();
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.signaled.lock().unwrap();
        let (mut guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |signaled| !*signaled)
            .unwrap();
        std::mem::replace(&mut *guard, false)
    }
}

pub struct Registry {
    connections: Mutex<HashMap<ConnectionId, Arc<ConnectionShared>>>,
    live: AtomicUsize,
    removed: Event,
    retired: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: Mutex::new(HashMap::new()),
            live: AtomicUsize::new(0),
            removed: Event::new(),
            retired: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Connections registered and not yet closed.
    pub fn len(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Connections whose worker has not finished tearing down.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Close every registered connection and block until all workers are gone.
    pub fn reset(&self) {
        self.close_all();
        while self.live_count() != 0 {
            self.removed.wait_timeout(Duration::from_millis(100));
        }
        self.join_retired();
    }

    /// Like `reset`, but gives up after `timeout`. Returns whether the live
    /// count reached zero.
    pub fn reset_timeout(&self, timeout: Duration) -> bool {
        self.close_all();
        let deadline = Instant::now() + timeout;
        while self.live_count() != 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.removed.wait_timeout((deadline - now).min(Duration::from_millis(100)));
        }
        self.join_retired();
        true
    }

    fn close_all(&self) {
        let drained: Vec<Arc<ConnectionShared>> = self
            .connections
            .lock()
            .unwrap()
            .drain()
            .map(|(_, conn)| conn)
            .collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "force-closing connections");
        }
        for conn in drained {
            conn.shutdown(self);
        }
    }

    fn join_retired(&self) {
        let handles = std::mem::take(&mut *self.retired.lock().unwrap());
        let me = thread::current().id();
        for handle in handles {
            if handle.thread().id() != me {
                let _ = handle.join();
            }
        }
    }

    pub(crate) fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub(crate) fn attach(&self, conn: Arc<ConnectionShared>) {
        self.connections.lock().unwrap().insert(conn.id(), conn);
    }

    pub(crate) fn detach(&self, id: ConnectionId) -> bool {
        self.connections.lock().unwrap().remove(&id).is_some()
    }

    /// Count a new live connection. The count drops when the guard does.
    pub(crate) fn live_guard(self: &Arc<Self>, id: ConnectionId) -> LiveGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        LiveGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    pub(crate) fn retire(&self, handle: JoinHandle<()>) {
        let mut retired = self.retired.lock().unwrap();
        retired.retain(|h| !h.is_finished());
        retired.push(handle);
    }
}

/// Held by a connection's worker state; dropping it marks the connection as
/// fully torn down.
pub(crate) struct LiveGuard {
    registry: Arc<Registry>,
    id: ConnectionId,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let remaining = self.registry.live.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(connection = %self.id, remaining, "connection torn down");
        self.registry.removed.set();
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

/// Process-wide registry used by the script bindings.
pub fn global() -> &'static Arc<Registry> {
    GLOBAL_REGISTRY.get_or_init(Registry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_guard_counts() {
        let registry = Registry::new();
        let a = registry.live_guard(registry.next_id());
        let b = registry.live_guard(registry.next_id());
        assert_eq!(registry.live_count(), 2);
        drop(a);
        assert_eq!(registry.live_count(), 1);
        drop(b);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_reset_waits_for_guards_released_elsewhere() {
        let registry = Registry::new();
        let guard = registry.live_guard(registry.next_id());
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            drop(guard);
        });
        registry.reset();
        assert_eq!(registry.live_count(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_reset_timeout_gives_up() {
        let registry = Registry::new();
        let guard = registry.live_guard(registry.next_id());
        assert!(!registry.reset_timeout(Duration::from_millis(20)));
        drop(guard);
        assert!(registry.reset_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_event_is_auto_reset() {
        let event = Event::new();
        event.set();
        assert!(event.wait_timeout(Duration::from_millis(10)));
        assert!(!event.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = Registry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert_ne!(a, b);
    }
}
