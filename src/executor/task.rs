//! Task representation and result handles.

use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// Priority of tasks routed to the long-task path, below every user priority.
pub const LONG_TASK_PRIORITY: i32 = -101;

/// A boxed, once-callable unit of work.
pub struct Task {
    func: Box<dyn FnOnce() + Send + 'static>,
    priority: i32,
}

impl Task {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::with_priority(f, 0)
    }

    pub fn with_priority<F>(f: F, priority: i32) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            func: Box::new(f),
            priority,
        }
    }

    /// Wraps `f` so its result, or its panic, is delivered to the returned handle.
    pub fn with_handle<F, R>(f: F, priority: i32) -> (Self, TaskHandle<R>)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let task = Task::with_priority(
            move || {
                let result = catch_unwind(AssertUnwindSafe(f))
                    .map_err(|payload| Error::TaskPanicked(panic_message(payload.as_ref())));
                // the caller may have dropped the handle
                let _ = sender.send(result);
            },
            priority,
        );
        (task, TaskHandle { receiver })
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn execute(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("priority", &self.priority)
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Result of waiting on a [`TaskHandle`] with a bound.
#[derive(Debug)]
pub enum WaitOutcome<R> {
    /// The task ran; holds its value or the panic it raised.
    Ready(Result<R>),
    /// The bound elapsed first. The task still runs later.
    Timeout,
    /// The task was dropped without running.
    Abandoned,
}

impl<R> WaitOutcome<R> {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready(_))
    }
}

/// Handle to the eventual result of a committed task.
#[derive(Debug)]
pub struct TaskHandle<R> {
    receiver: Receiver<Result<R>>,
}

impl<R> TaskHandle<R> {
    /// Blocks until the task finishes.
    pub fn wait(self) -> Result<R> {
        self.receiver.recv().unwrap_or(Err(Error::TaskDropped))
    }

    pub fn wait_timeout(&self, timeout: Duration) -> WaitOutcome<R> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => self.wait_forever(),
        }
    }

    pub fn wait_until(&self, deadline: Instant) -> WaitOutcome<R> {
        match self.receiver.recv_deadline(deadline) {
            Ok(result) => WaitOutcome::Ready(result),
            Err(RecvTimeoutError::Timeout) => WaitOutcome::Timeout,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Abandoned,
        }
    }

    fn wait_forever(&self) -> WaitOutcome<R> {
        match self.receiver.recv() {
            Ok(result) => WaitOutcome::Ready(result),
            Err(_) => WaitOutcome::Abandoned,
        }
    }
}
