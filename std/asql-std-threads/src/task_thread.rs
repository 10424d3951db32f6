//!
//! Task Thread
//!
//! A `TaskThread<S>` is a dedicated OS thread that owns a value of type `S`
//! and drains a FIFO queue of tasks, each receiving `&mut S`. Exactly one
//! task runs at a time.
//!
//! Shutdown is itself a queued message: `post_quit()` lets every task posted
//! before it run, then the thread drops `S` and exits. Tasks posted after
//! quit are refused. Dropping the `TaskThread` handle requests quit but does
//! not join, so a handle may be released from any thread.
//!
//! A panicking task is caught and logged; the worker keeps draining.
//!

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use asql_std_core::panic_message;

type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Task<S>),
    Quit,
}

struct QueueState<S> {
    messages: VecDeque<Message<S>>,
    quit_requested: bool,
}

struct TaskQueue<S> {
    state: Mutex<QueueState<S>>,
    condvar: Condvar,
}

impl<S> TaskQueue<S> {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                messages: VecDeque::new(),
                quit_requested: false,
            }),
            condvar: Condvar::new(),
        }
    }

    fn push(&self, message: Message<S>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.quit_requested {
            return false;
        }
        if matches!(message, Message::Quit) {
            state.quit_requested = true;
        }
        state.messages.push_back(message);
        self.condvar.notify_one();
        true
    }

    fn pop(&self) -> Message<S> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(message) = state.messages.pop_front() {
                return message;
            }
            state = self.condvar.wait(state).unwrap();
        }
    }

    fn len(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    fn quit_requested(&self) -> bool {
        self.state.lock().unwrap().quit_requested
    }
}

pub struct TaskThread<S> {
    name: String,
    queue: Arc<TaskQueue<S>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> TaskThread<S> {
    /// Spawn the worker thread, moving `state` onto it.
    pub fn spawn(name: impl Into<String>, state: S) -> io::Result<Self> {
        let name = name.into();
        let queue = Arc::new(TaskQueue::new());
        let worker_queue = Arc::clone(&queue);
        let worker_name = name.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&worker_name, worker_queue, state))?;

        Ok(Self {
            name,
            queue,
            handle: Some(handle),
        })
    }
}

impl<S> TaskThread<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `task`. Returns false, dropping the task, once quit was requested.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.queue.push(Message::Run(Box::new(task)))
    }

    /// Queue the quit request behind everything posted so far.
    pub fn post_quit(&self) -> bool {
        self.queue.push(Message::Quit)
    }

    pub fn is_quit_requested(&self) -> bool {
        self.queue.quit_requested()
    }

    /// Number of queued messages not yet picked up by the worker.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Take ownership of the OS thread handle, leaving this `TaskThread`
    /// able to post but no longer able to join.
    pub fn take_handle(&mut self) -> Option<JoinHandle<()>> {
        self.handle.take()
    }

    /// Request quit and wait for the worker to exit.
    pub fn join(mut self) -> thread::Result<()> {
        self.post_quit();
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl<S> Drop for TaskThread<S> {
    fn drop(&mut self) {
        self.post_quit();
    }
}

fn worker_loop<S>(name: &str, queue: Arc<TaskQueue<S>>, mut state: S) {
    tracing::debug!(thread = name, "worker started");
    loop {
        match queue.pop() {
            Message::Run(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(&mut state))) {
                    tracing::warn!(
                        thread = name,
                        panic = %panic_message(payload.as_ref()),
                        "worker task panicked"
                    );
                }
            }
            Message::Quit => break,
        }
    }
    drop(state);
    tracing::debug!(thread = name, "worker exited");
}
