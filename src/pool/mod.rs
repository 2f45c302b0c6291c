//! The thread pool: fixed primary workers, elastic secondary workers and
//! the monitor that scales them.
//!
//! # Example
//!
//! ```no_run
//! use tidepool::{Config, ThreadPool};
//!
//! let pool = ThreadPool::new(Config::builder().primary_threads(4).build()?)?;
//! let handle = pool.commit(|| 6 * 7)?;
//! assert_eq!(handle.wait()?, 42);
//! # Ok::<(), tidepool::Error>(())
//! ```

mod dispatch;
mod monitor;
mod stats;

pub use dispatch::{Destination, DispatchHint};
pub use stats::{PoolStats, WorkerStats};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::primary::PrimaryWorker;
use crate::executor::secondary::SecondaryWorker;
use crate::executor::{
    Callback, GroupTask, PoolQueues, Task, TaskGroup, TaskHandle, WaitOutcome, LONG_TASK_PRIORITY,
};
use crate::status::Status;
use monitor::MonitorHandle;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Work-stealing thread pool with elastic overflow capacity.
///
/// Dropping a started pool stops it. Tasks still queued at that point
/// never run; their handles resolve to [`Error::TaskDropped`].
pub struct ThreadPool {
    inner: Arc<PoolInner>,
}

impl ThreadPool {
    /// Creates and starts a pool.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = Self::unstarted(config);
        pool.start()?;
        Ok(pool)
    }

    /// Creates a pool without starting any threads.
    pub fn unstarted(config: Config) -> Self {
        Self {
            inner: Arc::new(PoolInner::new(config)),
        }
    }

    /// Replaces the configuration. Only allowed while stopped.
    pub fn configure(&self, config: Config) -> Result<()> {
        let _guard = self.inner.lifecycle.lock();
        if self.inner.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        config.validate()?;
        *self.inner.config.write() = Arc::new(config);
        Ok(())
    }

    /// Starts every worker and the monitor. Does nothing if already started.
    pub fn start(&self) -> Result<()> {
        self.inner.start()
    }

    /// Stops the monitor, then every worker.
    pub fn stop(&self) -> Result<()> {
        self.inner.stop()
    }

    pub fn is_started(&self) -> bool {
        self.inner.is_initialized()
    }

    pub fn config(&self) -> Arc<Config> {
        self.inner.config()
    }

    /// Resolves a hint to a destination. Round-robin hints advance the cursor.
    pub fn dispatch(&self, hint: DispatchHint) -> Destination {
        let primary_count = self.inner.primaries.read().len();
        dispatch::resolve(hint, &self.inner.cursor, primary_count)
    }

    /// Commits `f` to the next primary worker in turn.
    pub fn commit<F, R>(&self, f: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.commit_with_hint(f, DispatchHint::RoundRobin)
    }

    pub fn commit_with_hint<F, R>(&self, f: F, hint: DispatchHint) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.inner.ensure_started()?;

        match self.dispatch(hint) {
            Destination::Primary(index) => {
                let (task, handle) = Task::with_handle(f, 0);
                self.inner.push_primary(index, task);
                Ok(handle)
            }
            Destination::Pool => {
                let (task, handle) = Task::with_handle(f, 0);
                self.inner.queues.tasks.push(task);
                Ok(handle)
            }
            Destination::LongTask => {
                self.inner.ensure_secondary()?;
                let (task, handle) = Task::with_handle(f, LONG_TASK_PRIORITY);
                self.inner.queues.priority.push(task, LONG_TASK_PRIORITY);
                Ok(handle)
            }
        }
    }

    /// Commits `f` to the priority queue, drained by secondary workers only.
    /// Brings up a secondary worker if none is running.
    pub fn commit_with_priority<F, R>(&self, f: F, priority: i32) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.inner.ensure_started()?;
        self.inner.ensure_secondary()?;

        let (task, handle) = Task::with_handle(f, priority);
        self.inner.queues.priority.push(task, priority);
        Ok(handle)
    }

    /// Commits every task in `group` and waits for all of them, up to
    /// `min(group.ttl(), ttl)` in total.
    ///
    /// Returns the first non-OK status among the tasks. Tasks still
    /// pending at the deadline report a timeout but keep running. The
    /// group's callback, if any, receives the same status.
    pub fn submit(&self, group: TaskGroup, ttl: Duration) -> Status {
        let TaskGroup {
            tasks,
            ttl: group_ttl,
            on_finished,
        } = group;

        let status = self.run_group(tasks, group_ttl.min(ttl));
        if let Some(callback) = on_finished {
            callback(status.clone());
        }
        status
    }

    /// [`submit`](Self::submit) for a single task.
    pub fn submit_task<F>(&self, f: F, ttl: Duration, on_finished: Option<Callback>) -> Status
    where
        F: FnOnce() + Send + 'static,
    {
        let mut group = TaskGroup::new().add_task(f).with_ttl(ttl);
        group.on_finished = on_finished;
        self.submit(group, ttl)
    }

    fn run_group(&self, tasks: Vec<GroupTask>, ttl: Duration) -> Status {
        if let Err(e) = self.inner.ensure_started() {
            return Status::from(e);
        }

        let deadline = Instant::now().checked_add(ttl);
        let mut status = Status::ok();
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            match self.commit(task) {
                Ok(handle) => handles.push(handle),
                Err(e) => status += Status::from(e),
            }
        }

        for handle in handles {
            let outcome = match deadline {
                Some(deadline) => handle.wait_until(deadline),
                None => handle.wait_timeout(Duration::MAX),
            };
            status += match outcome {
                WaitOutcome::Ready(Ok(())) => Status::ok(),
                WaitOutcome::Ready(Err(e)) => Status::from(e),
                WaitOutcome::Timeout => Status::timeout("task group deadline exceeded"),
                WaitOutcome::Abandoned => Status::error("task dropped before it ran"),
            };
        }
        status
    }

    /// Index of the primary worker running the calling thread, if any.
    pub fn worker_index_for_current_thread(&self) -> Option<usize> {
        self.inner
            .thread_index
            .read()
            .get(&thread::current().id())
            .copied()
    }

    /// Starts up to `n` secondary workers, never exceeding `max_threads`.
    /// Returns how many were started.
    pub fn grow_secondary(&self, n: usize) -> Result<usize> {
        self.inner.ensure_started()?;
        self.inner.create_secondary(n)
    }

    /// Asks `n` secondary workers to exit.
    pub fn shrink_secondary(&self, n: usize) -> Result<()> {
        self.inner.ensure_started()?;
        self.inner.release_secondary(n)
    }

    /// Secondary workers not yet told to exit.
    pub fn secondary_count(&self) -> usize {
        self.inner.live_secondaries()
    }

    pub fn stats(&self) -> PoolStats {
        let primaries = self.inner.primaries.read().clone();
        let local: usize = primaries.iter().map(|p| p.queued()).sum();

        PoolStats {
            primaries: primaries
                .iter()
                .map(|p| {
                    let state = p.core().state();
                    WorkerStats {
                        index: p.index(),
                        tasks_executed: state.tasks_executed(),
                        tasks_stolen: state.tasks_stolen(),
                        running: state.is_running(),
                    }
                })
                .collect(),
            secondary_workers: self.secondary_count(),
            queued_tasks: self.inner.queues.tasks.len() + local,
            queued_priority_tasks: self.inner.queues.priority.len(),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.inner.is_initialized() {
            if let Err(e) = self.inner.stop() {
                tracing::warn!(error = %e, "error stopping thread pool on drop");
            }
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("started", &self.is_started())
            .field("primary_workers", &self.inner.primaries.read().len())
            .field("secondary_workers", &self.secondary_count())
            .finish()
    }
}

pub(crate) struct PoolInner {
    config: RwLock<Arc<Config>>,
    queues: Arc<PoolQueues>,
    // replaced wholesale on start and stop, never edited in place
    primaries: RwLock<Arc<[Arc<PrimaryWorker>]>>,
    secondaries: Mutex<Vec<SecondaryWorker>>,
    thread_index: RwLock<HashMap<ThreadId, usize>>,
    cursor: AtomicUsize,
    next_secondary_id: AtomicUsize,
    initialized: AtomicBool,
    lifecycle: Mutex<()>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl PoolInner {
    fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(Arc::new(config)),
            queues: Arc::new(PoolQueues::new()),
            primaries: RwLock::new(no_primaries()),
            secondaries: Mutex::new(Vec::new()),
            thread_index: RwLock::new(HashMap::new()),
            cursor: AtomicUsize::new(0),
            next_secondary_id: AtomicUsize::new(0),
            initialized: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            monitor: Mutex::new(None),
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) fn config(&self) -> Arc<Config> {
        self.config.read().clone()
    }

    fn ensure_started(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn start(self: &Arc<Self>) -> Result<()> {
        let _guard = self.lifecycle.lock();
        if self.is_initialized() {
            return Ok(());
        }

        let config = self.config();
        config.validate()?;

        if let Err(e) = self.start_workers(&config) {
            tracing::error!(error = %e, "thread pool failed to start");
            let _ = self.teardown();
            return Err(e);
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            primary = config.primary_threads,
            secondary = config.secondary_threads,
            max = config.max_threads,
            monitor = config.monitor_enable,
            "thread pool started"
        );
        Ok(())
    }

    fn start_workers(self: &Arc<Self>, config: &Arc<Config>) -> Result<()> {
        // left behind by a commit that raced the previous stop
        let stale = self.queues.clear();
        if stale > 0 {
            tracing::debug!(dropped = stale, "stale queued tasks dropped on start");
        }

        if config.monitor_enable {
            let monitor = MonitorHandle::spawn(Arc::downgrade(self), config)?;
            *self.monitor.lock() = Some(monitor);
        }

        let primaries: Arc<[Arc<PrimaryWorker>]> = (0..config.primary_threads)
            .map(|index| Arc::new(PrimaryWorker::new(index)))
            .collect();
        *self.primaries.write() = primaries.clone();

        for primary in primaries.iter() {
            let id = primary.init(primaries.clone(), self.queues.clone(), config.clone())?;
            self.thread_index.write().insert(id, primary.index());
        }
        self.queues.set_primaries_ready(true);

        let mut secondaries = self.secondaries.lock();
        self.spawn_secondaries(&mut secondaries, config, config.secondary_threads)?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let _guard = self.lifecycle.lock();
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return Err(Error::NotInitialized);
        }

        let result = self.teardown();
        match &result {
            Ok(()) => tracing::info!("thread pool stopped"),
            Err(e) => tracing::error!(error = %e, "thread pool stopped with error"),
        }
        result
    }

    /// Stops the monitor, then the primaries, then the secondaries, then
    /// drops whatever is still queued. Returns the first primary worker error.
    fn teardown(&self) -> Result<()> {
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.shutdown();
        }
        self.queues.set_primaries_ready(false);

        let primaries = std::mem::replace(&mut *self.primaries.write(), no_primaries());
        for primary in primaries.iter() {
            primary.core().request_stop();
        }
        let mut first_error = None;
        for primary in primaries.iter() {
            if !primary.core().is_initialized() {
                continue;
            }
            if let Err(e) = primary.core().destroy() {
                first_error.get_or_insert(e);
            }
        }

        let mut secondaries = self.secondaries.lock();
        for worker in secondaries.iter() {
            worker.core().request_stop();
        }
        for worker in secondaries.drain(..) {
            if let Err(e) = worker.core().destroy() {
                tracing::warn!(id = worker.id(), error = %e, "secondary worker failed to stop");
            }
        }
        drop(secondaries);

        let dropped = self.queues.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "queued tasks abandoned on stop");
        }

        self.thread_index.write().clear();
        first_error.map_or(Ok(()), Err)
    }

    fn push_primary(&self, index: usize, task: Task) {
        let primary = self.primaries.read().get(index).cloned();
        match primary {
            Some(primary) => primary.push_task(task),
            None => self.queues.tasks.push(task),
        }
    }

    fn live_secondaries(&self) -> usize {
        self.secondaries
            .lock()
            .iter()
            .filter(|w| w.core().state().is_active())
            .count()
    }

    fn create_secondary(&self, n: usize) -> Result<usize> {
        let config = self.config();
        let mut secondaries = self.secondaries.lock();
        prune_finished(&mut secondaries);
        self.spawn_secondaries(&mut secondaries, &config, n)
    }

    fn release_secondary(&self, n: usize) -> Result<()> {
        let mut secondaries = self.secondaries.lock();
        prune_finished(&mut secondaries);

        let live: Vec<&SecondaryWorker> = secondaries
            .iter()
            .filter(|w| w.core().state().is_active())
            .collect();
        if n > live.len() {
            return Err(Error::InsufficientSecondary {
                requested: n,
                available: live.len(),
            });
        }

        for worker in live.into_iter().take(n) {
            worker.core().request_stop();
        }
        if n > 0 {
            tracing::debug!(released = n, "secondary workers released");
        }
        Ok(())
    }

    /// Makes sure something drains the priority queue.
    fn ensure_secondary(&self) -> Result<()> {
        let mut secondaries = self.secondaries.lock();
        prune_finished(&mut secondaries);
        if secondaries.iter().any(|w| w.core().state().is_active()) {
            return Ok(());
        }

        let config = self.config();
        if self.spawn_secondaries(&mut secondaries, &config, 1)? == 0 {
            return Err(Error::NoSecondaryCapacity);
        }
        Ok(())
    }

    fn spawn_secondaries(
        &self,
        secondaries: &mut Vec<SecondaryWorker>,
        config: &Arc<Config>,
        n: usize,
    ) -> Result<usize> {
        let room = config.secondary_capacity().saturating_sub(secondaries.len());
        let count = n.min(room);
        for _ in 0..count {
            let id = self.next_secondary_id.fetch_add(1, Ordering::Relaxed);
            let worker = SecondaryWorker::new(id, config.secondary_ttl);
            worker.init(self.queues.clone(), config.clone())?;
            secondaries.push(worker);
        }
        if count > 0 {
            tracing::debug!(
                created = count,
                total = secondaries.len(),
                "secondary workers created"
            );
        }
        Ok(count)
    }

    /// One monitor round: grow by one when busy, then reap expired workers.
    pub(crate) fn monitor_tick(&self) {
        let config = self.config();
        let primaries = self.primaries.read().clone();
        let busy = !primaries.is_empty()
            && primaries.iter().all(|p| p.core().state().is_running());
        let backlog = !self.queues.priority.is_empty();

        let mut secondaries = self.secondaries.lock();
        prune_finished(&mut secondaries);

        if busy || backlog {
            tracing::debug!(busy, backlog, "monitor growing secondary workers");
            if let Err(e) = self.spawn_secondaries(&mut secondaries, &config, 1) {
                tracing::warn!(error = %e, "monitor failed to start a secondary worker");
            }
        }

        let before = secondaries.len();
        secondaries.retain_mut(|worker| {
            if !worker.freeze(config.secondary_ttl) {
                return true;
            }
            if let Err(e) = worker.core().destroy() {
                tracing::warn!(id = worker.id(), error = %e, "secondary worker failed to stop");
            }
            false
        });
        let reaped = before - secondaries.len();
        if reaped > 0 {
            tracing::debug!(reaped, remaining = secondaries.len(), "secondary workers expired");
        }
    }
}

fn no_primaries() -> Arc<[Arc<PrimaryWorker>]> {
    Arc::from(Vec::new())
}

// joins workers whose threads have already exited
fn prune_finished(secondaries: &mut Vec<SecondaryWorker>) {
    secondaries.retain(|worker| {
        let core = worker.core();
        if core.state().is_active() || !core.is_finished() {
            return true;
        }
        if let Err(e) = core.destroy() {
            tracing::warn!(id = worker.id(), error = %e, "secondary worker exited with error");
        }
        false
    });
}
