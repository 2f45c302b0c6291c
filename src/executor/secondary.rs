use super::task::Task;
use super::worker::{WorkerCore, WorkerKind, WorkerLoop, WorkerState};
use super::PoolQueues;
use crate::config::Config;
use crate::error::Result;
use std::sync::Arc;
use std::thread::ThreadId;

/// Elastic worker fed by the pool queue, with the priority queue as
/// fallback. Reaped by the monitor once its TTL runs out while idle.
pub(crate) struct SecondaryWorker {
    id: usize,
    core: WorkerCore,
    ttl: i64,
}

impl SecondaryWorker {
    pub fn new(id: usize, ttl: u32) -> Self {
        Self {
            id,
            core: WorkerCore::new(WorkerKind::Secondary),
            ttl: i64::from(ttl),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn core(&self) -> &WorkerCore {
        &self.core
    }

    pub fn init(&self, queues: Arc<PoolQueues>, config: Arc<Config>) -> Result<ThreadId> {
        let name = format!("{}-secondary-{}", config.thread_name_prefix, self.id);
        let worker_loop = SecondaryLoop {
            state: self.core.state().clone(),
            queues,
            config: config.clone(),
            batch: Vec::new(),
        };
        self.core.spawn(name, &config, None, worker_loop)
    }

    /// One monitor tick: busy workers regain TTL up to `max_ttl`, idle ones
    /// lose one. Returns whether the worker can be reaped.
    pub fn freeze(&mut self, max_ttl: u32) -> bool {
        let running = self.core.state().is_running();
        if running {
            self.ttl = (self.ttl + 1).min(i64::from(max_ttl));
        } else {
            self.ttl -= 1;
        }
        self.ttl <= 0 && !running
    }
}

impl std::fmt::Debug for SecondaryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryWorker")
            .field("id", &self.id)
            .field("ttl", &self.ttl)
            .field("core", &self.core)
            .finish()
    }
}

struct SecondaryLoop {
    state: Arc<WorkerState>,
    queues: Arc<PoolQueues>,
    config: Arc<Config>,
    batch: Vec<Task>,
}

impl SecondaryLoop {
    // blocks briefly instead of spinning on an empty queue
    fn wait_run_task(&self) {
        if let Some(task) = self.queues.tasks.pop_timeout(self.config.queue_empty_interval) {
            self.state.run_task(task);
        }
    }
}

impl WorkerLoop for SecondaryLoop {
    fn state(&self) -> &WorkerState {
        &self.state
    }

    fn batch_enabled(&self) -> bool {
        self.config.batch_tasks
    }

    fn process_task(&mut self) {
        let task = self
            .queues
            .tasks
            .try_pop()
            .or_else(|| self.queues.priority.try_pop());

        match task {
            Some(task) => self.state.run_task(task),
            None => self.wait_run_task(),
        }
    }

    fn process_tasks(&mut self) {
        let mut batch = std::mem::take(&mut self.batch);
        let found = self
            .queues
            .tasks
            .try_pop_batch(&mut batch, self.config.pool_batch_size)
            || self.queues.priority.try_pop_batch(&mut batch, 1);

        if found {
            self.state.run_tasks(&mut batch);
        } else {
            self.wait_run_task();
        }
        self.batch = batch;
    }
}
