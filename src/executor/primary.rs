use super::task::Task;
use super::worker::{WorkerCore, WorkerKind, WorkerLoop, WorkerState};
use super::PoolQueues;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::queue::WorkStealingDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Fixed worker with two local deques. Drains its own deques, then the
/// pool queue, then steals from the next few peers.
pub(crate) struct PrimaryWorker {
    index: usize,
    core: WorkerCore,
    primary_queue: WorkStealingDeque<Task>,
    // checked first on pop and on steal, it sees less traffic
    secondary_queue: WorkStealingDeque<Task>,
}

impl PrimaryWorker {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            core: WorkerCore::new(WorkerKind::Primary),
            primary_queue: WorkStealingDeque::new(),
            secondary_queue: WorkStealingDeque::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn core(&self) -> &WorkerCore {
        &self.core
    }

    /// Enqueues onto whichever local deque is free first, then wakes the worker.
    pub fn push_task(&self, task: Task) {
        let mut task = task;
        loop {
            match self.primary_queue.try_push(task) {
                Ok(()) => break,
                Err(back) => task = back,
            }
            match self.secondary_queue.try_push(task) {
                Ok(()) => break,
                Err(back) => task = back,
            }
            thread::yield_now();
        }
        self.core.unpark();
    }

    /// Tasks waiting in the local deques, approximately.
    pub fn queued(&self) -> usize {
        self.primary_queue.len() + self.secondary_queue.len()
    }

    /// Spawns the worker thread. `peers` must hold every primary worker,
    /// `self` included at `self.index`.
    pub fn init(
        self: &Arc<Self>,
        peers: Arc<[Arc<PrimaryWorker>]>,
        queues: Arc<PoolQueues>,
        config: Arc<Config>,
    ) -> Result<ThreadId> {
        let name = format!("{}-primary-{}", config.thread_name_prefix, self.index);
        let pin_core = config.bind_cpu.then_some(self.index);
        let worker_loop = PrimaryLoop::new(self.clone(), peers, queues, config.clone());
        self.core.spawn(name, &config, pin_core, worker_loop)
    }

    fn pop_local(&self) -> Option<Task> {
        self.secondary_queue
            .try_pop()
            .or_else(|| self.primary_queue.try_pop())
    }

    fn pop_local_batch(&self, out: &mut Vec<Task>, max: usize) -> bool {
        self.secondary_queue.try_pop_batch(out, max);
        let left = max.saturating_sub(out.len());
        if left > 0 {
            self.primary_queue.try_pop_batch(out, left);
        }
        !out.is_empty()
    }

    fn steal(&self) -> Option<Task> {
        self.secondary_queue
            .try_steal()
            .or_else(|| self.primary_queue.try_steal())
    }

    fn steal_batch(&self, out: &mut Vec<Task>, max: usize) -> usize {
        let before = out.len();
        self.secondary_queue.try_steal_batch(out, max);
        let left = max.saturating_sub(out.len() - before);
        if left > 0 {
            self.primary_queue.try_steal_batch(out, left);
        }
        out.len() - before
    }
}

impl std::fmt::Debug for PrimaryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryWorker")
            .field("index", &self.index)
            .field("queued", &self.queued())
            .field("core", &self.core)
            .finish()
    }
}

/// The next `range` indices after `index`, wrapping, never `index` itself.
pub(crate) fn steal_victims(index: usize, worker_count: usize, steal_range: usize) -> Vec<usize> {
    let range = steal_range.min(worker_count.saturating_sub(1));
    (1..=range).map(|i| (index + i) % worker_count).collect()
}

struct PrimaryLoop {
    worker: Arc<PrimaryWorker>,
    peers: Arc<[Arc<PrimaryWorker>]>,
    victims: Vec<usize>,
    queues: Arc<PoolQueues>,
    config: Arc<Config>,
    idle_rounds: u32,
    batch: Vec<Task>,
}

impl PrimaryLoop {
    fn new(
        worker: Arc<PrimaryWorker>,
        peers: Arc<[Arc<PrimaryWorker>]>,
        queues: Arc<PoolQueues>,
        config: Arc<Config>,
    ) -> Self {
        let victims = steal_victims(worker.index, peers.len(), config.effective_steal_range());
        Self {
            worker,
            peers,
            victims,
            queues,
            config,
            idle_rounds: 0,
            batch: Vec::new(),
        }
    }

    // peers may not have spawned yet while the pool is starting
    fn can_steal(&self) -> bool {
        self.queues.primaries_ready()
    }

    fn steal_task(&self) -> Option<Task> {
        if !self.can_steal() {
            return None;
        }
        for &victim in &self.victims {
            // a missing peer just isn't ready yet
            let Some(peer) = self.peers.get(victim) else {
                continue;
            };
            if let Some(task) = peer.steal() {
                self.worker.core.state().record_stolen(1);
                return Some(task);
            }
        }
        None
    }

    fn steal_batch(&self, out: &mut Vec<Task>) -> bool {
        if !self.can_steal() {
            return false;
        }
        let mut left = self.config.steal_batch_size;
        for &victim in &self.victims {
            if left == 0 {
                break;
            }
            let Some(peer) = self.peers.get(victim) else {
                continue;
            };
            let stolen = peer.steal_batch(out, left);
            if stolen > 0 {
                self.worker.core.state().record_stolen(stolen);
                left -= stolen;
            }
        }
        !out.is_empty()
    }

    fn idle(&mut self) {
        self.idle_rounds += 1;
        if self.idle_rounds >= self.config.primary_busy_epoch {
            self.idle_rounds = 0;
            thread::park_timeout(self.config.primary_idle_interval);
        } else {
            thread::yield_now();
        }
    }
}

impl WorkerLoop for PrimaryLoop {
    fn state(&self) -> &WorkerState {
        self.worker.core.state()
    }

    fn batch_enabled(&self) -> bool {
        self.config.batch_tasks
    }

    fn check_ready(&self) -> Result<()> {
        let registered = self
            .peers
            .get(self.worker.index)
            .map_or(false, |peer| Arc::ptr_eq(peer, &self.worker));
        if self.peers.len() != self.config.primary_threads || !registered {
            tracing::error!(
                index = self.worker.index,
                peers = self.peers.len(),
                expected = self.config.primary_threads,
                "primary worker set incomplete at start"
            );
            return Err(Error::PrimaryWorkerMissing {
                index: self.worker.index,
            });
        }
        Ok(())
    }

    fn process_task(&mut self) {
        let task = self
            .worker
            .pop_local()
            .or_else(|| self.queues.tasks.try_pop())
            .or_else(|| self.steal_task());

        match task {
            Some(task) => {
                self.idle_rounds = 0;
                self.worker.core.state().run_task(task);
            }
            None => self.idle(),
        }
    }

    fn process_tasks(&mut self) {
        let mut batch = std::mem::take(&mut self.batch);
        let found = self
            .worker
            .pop_local_batch(&mut batch, self.config.local_batch_size)
            || self
                .queues
                .tasks
                .try_pop_batch(&mut batch, self.config.pool_batch_size)
            || self.steal_batch(&mut batch);

        if found {
            self.idle_rounds = 0;
            self.worker.core.state().run_tasks(&mut batch);
        } else {
            self.idle();
        }
        self.batch = batch;
    }
}
