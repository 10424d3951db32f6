//!
//! Origin Event Pump
//!
//! Every thread that issues connector operations owns one `EventPump`, a FIFO
//! queue of jobs that only that thread drains. Worker threads post completions
//! into the pump of the thread that requested the operation, so callbacks
//! always run on the thread that registered them.
//!
//! Jobs run inside the marshaling boundary: an `Err` returned by a job or a
//! panic raised by it is forwarded to the error sink and the pump carries on.
//!

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::exception::{fire_error, ScriptError};

type Job = Box<dyn FnOnce() -> Result<(), ScriptError> + Send>;

struct PumpQueue {
    jobs: Mutex<VecDeque<Job>>,
    condvar: Condvar,
}

#[derive(Clone)]
pub struct EventPump {
    queue: Arc<PumpQueue>,
}

thread_local! {
    static CURRENT_PUMP: EventPump = EventPump::new();
}

impl fmt::Debug for EventPump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPump").field("pending", &self.pending()).finish()
    }
}

impl Default for EventPump {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPump {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(PumpQueue {
                jobs: Mutex::new(VecDeque::new()),
                condvar: Condvar::new(),
            }),
        }
    }

    /// The pump belonging to the calling thread.
    pub fn current() -> Self {
        CURRENT_PUMP.with(|pump| pump.clone())
    }

    pub fn same_queue(&self, other: &EventPump) -> bool {
        Arc::ptr_eq(&self.queue, &other.queue)
    }

    pub fn post<F>(&self, job: F)
    where
        F: FnOnce() -> Result<(), ScriptError> + Send + 'static,
    {
        let mut jobs = self.queue.jobs.lock().unwrap();
        jobs.push_back(Box::new(job));
        self.queue.condvar.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.queue.jobs.lock().unwrap().len()
    }

    /// Run every job queued at the time of the call. Jobs posted while these
    /// run are left for the next call.
    pub fn run_pending(&self) -> usize {
        let batch: VecDeque<Job> = std::mem::take(&mut *self.queue.jobs.lock().unwrap());
        let count = batch.len();
        for job in batch {
            run_job(job);
        }
        count
    }

    /// Block until at least one job is queued or `timeout` elapses, then run
    /// whatever is queued.
    pub fn wait_and_run(&self, timeout: Duration) -> usize {
        {
            let jobs = self.queue.jobs.lock().unwrap();
            let _ = self
                .queue
                .condvar
                .wait_timeout_while(jobs, timeout, |jobs| jobs.is_empty())
                .unwrap();
        }
        self.run_pending()
    }

    /// Pump jobs until `done` returns true. Returns false on timeout.
    pub fn run_until<F>(&self, mut done: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.wait_and_run((deadline - now).min(Duration::from_millis(50)));
            if done() {
                return true;
            }
        }
    }
}

fn run_job(job: Job) {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => fire_error(err),
        Err(payload) => fire_error(ScriptError::Panic(panic_message(payload.as_ref()))),
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
