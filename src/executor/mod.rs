//! Task execution infrastructure.
//!
//! Tasks and their result handles, task groups, and the two kinds of
//! worker thread the pool runs.

pub mod group;
pub(crate) mod primary;
pub(crate) mod sched;
pub(crate) mod secondary;
pub mod task;
pub(crate) mod worker;

pub use group::{Callback, GroupTask, TaskGroup, MAX_BLOCK_TTL};
pub use task::{Task, TaskHandle, WaitOutcome, LONG_TASK_PRIORITY};
pub use worker::WorkerKind;

use crate::queue::{BlockingPriorityQueue, BlockingQueue};
use std::sync::atomic::{AtomicBool, Ordering};

/// Queues and flags shared by every worker in a pool.
#[derive(Debug, Default)]
pub(crate) struct PoolQueues {
    /// FIFO queue drained by primary and secondary workers.
    pub tasks: BlockingQueue<Task>,
    /// Drained by secondary workers only.
    pub priority: BlockingPriorityQueue<Task>,
    // set once every primary worker thread is up, cleared on teardown
    primaries_ready: AtomicBool,
}

impl PoolQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primaries_ready(&self) -> bool {
        self.primaries_ready.load(Ordering::Acquire)
    }

    pub fn set_primaries_ready(&self, ready: bool) {
        self.primaries_ready.store(ready, Ordering::Release);
    }

    /// Drops every queued task, disconnecting their handles.
    pub fn clear(&self) -> usize {
        self.tasks.clear() + self.priority.clear()
    }
}
