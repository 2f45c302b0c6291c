// worker thread base shared by primary and secondary workers
use super::sched;
use super::task::{panic_message, Task};
use crate::config::Config;
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread, ThreadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Primary,
    Secondary,
}

// flags and counters, shared between the worker thread and the pool
#[derive(Debug)]
pub(crate) struct WorkerState {
    active: AtomicBool,
    running: AtomicBool,
    tasks_executed: AtomicU64,
    tasks_stolen: AtomicU64,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tasks_executed: AtomicU64::new(0),
            tasks_stolen: AtomicU64::new(0),
        }
    }

    /// Whether the run loop should keep going.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether a task is executing right now.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn tasks_executed(&self) -> u64 {
        self.tasks_executed.load(Ordering::Relaxed)
    }

    pub fn tasks_stolen(&self) -> u64 {
        self.tasks_stolen.load(Ordering::Relaxed)
    }

    pub fn record_stolen(&self, count: usize) {
        self.tasks_stolen.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn run_task(&self, task: Task) {
        self.running.store(true, Ordering::Release);
        execute(task);
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.running.store(false, Ordering::Release);
    }

    /// Runs and drains `tasks`.
    pub fn run_tasks(&self, tasks: &mut Vec<Task>) {
        self.running.store(true, Ordering::Release);
        let count = tasks.len() as u64;
        for task in tasks.drain(..) {
            execute(task);
        }
        self.tasks_executed.fetch_add(count, Ordering::Relaxed);
        self.running.store(false, Ordering::Release);
    }

    fn reset(&self) {
        self.active.store(false, Ordering::Release);
        self.running.store(false, Ordering::Release);
        self.tasks_executed.store(0, Ordering::Relaxed);
        self.tasks_stolen.store(0, Ordering::Relaxed);
    }
}

fn execute(task: Task) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task.execute())) {
        tracing::error!(panic = %panic_message(payload.as_ref()), "task panicked");
    }
}

/// Body of a worker thread: where it looks for work and what it does when idle.
pub(crate) trait WorkerLoop: Send + 'static {
    fn state(&self) -> &WorkerState;

    fn batch_enabled(&self) -> bool;

    fn process_task(&mut self);

    fn process_tasks(&mut self);

    /// Checked once before the loop starts.
    fn check_ready(&self) -> Result<()> {
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.check_ready()?;
        if self.batch_enabled() {
            while self.state().is_active() {
                self.process_tasks();
            }
        } else {
            while self.state().is_active() {
                self.process_task();
            }
        }
        Ok(())
    }
}

/// Owns one worker thread and its lifecycle.
pub(crate) struct WorkerCore {
    kind: WorkerKind,
    state: Arc<WorkerState>,
    handle: Mutex<Option<JoinHandle<Result<()>>>>,
    thread: RwLock<Option<Thread>>,
}

impl WorkerCore {
    pub fn new(kind: WorkerKind) -> Self {
        Self {
            kind,
            state: Arc::new(WorkerState::new()),
            handle: Mutex::new(None),
            thread: RwLock::new(None),
        }
    }

    pub fn state(&self) -> &Arc<WorkerState> {
        &self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Spawns the worker thread running `worker_loop`.
    pub fn spawn<L: WorkerLoop>(
        &self,
        name: String,
        config: &Config,
        pin_core: Option<usize>,
        mut worker_loop: L,
    ) -> Result<ThreadId> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let (policy, priority) = match self.kind {
            WorkerKind::Primary => (config.primary_policy, config.primary_priority),
            WorkerKind::Secondary => (config.secondary_policy, config.secondary_priority),
        };

        let mut builder = thread::Builder::new().name(name);
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        self.state.active.store(true, Ordering::Release);
        let spawned = builder.spawn(move || {
            sched::apply_sched_params(policy, priority);
            if let Some(core) = pin_core {
                sched::pin_to_core(core);
            }

            let result = worker_loop.run();
            if let Err(ref e) = result {
                tracing::error!(error = %e, "worker loop exited with error");
            }
            result
        });

        let joiner = match spawned {
            Ok(joiner) => joiner,
            Err(e) => {
                self.state.active.store(false, Ordering::Release);
                return Err(e.into());
            }
        };

        let id = joiner.thread().id();
        *self.thread.write() = Some(joiner.thread().clone());
        *handle = Some(joiner);
        Ok(id)
    }

    pub fn unpark(&self) {
        if let Some(thread) = self.thread.read().as_ref() {
            thread.unpark();
        }
    }

    /// Tells the loop to exit without waiting for it.
    pub fn request_stop(&self) {
        self.state.active.store(false, Ordering::Release);
        self.unpark();
    }

    /// Whether the thread is gone or was never started.
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map_or(true, |joiner| joiner.is_finished())
    }

    /// Stops the loop, joins the thread and resets the counters.
    pub fn destroy(&self) -> Result<()> {
        let joiner = self.handle.lock().take().ok_or(Error::NotInitialized)?;
        self.request_stop();

        let joined = joiner.join();
        *self.thread.write() = None;
        self.state.reset();

        match joined {
            Ok(result) => result,
            Err(payload) => Err(Error::WorkerPanic(panic_message(payload.as_ref()))),
        }
    }
}

impl std::fmt::Debug for WorkerCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCore")
            .field("kind", &self.kind)
            .field("active", &self.state.is_active())
            .field("running", &self.state.is_running())
            .field("tasks_executed", &self.state.tasks_executed())
            .finish()
    }
}
