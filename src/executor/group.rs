use crate::status::Status;
use std::time::Duration;

/// Longest wait a group submission ever blocks for.
pub const MAX_BLOCK_TTL: Duration = Duration::from_millis(1_999_999_999);

pub type GroupTask = Box<dyn FnOnce() + Send + 'static>;
pub type Callback = Box<dyn FnOnce(Status) + Send + 'static>;

/// Tasks submitted together under one deadline, with an optional
/// callback that receives the aggregate status.
pub struct TaskGroup {
    pub(crate) tasks: Vec<GroupTask>,
    pub(crate) ttl: Duration,
    pub(crate) on_finished: Option<Callback>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            ttl: MAX_BLOCK_TTL,
            on_finished: None,
        }
    }

    pub fn add_task<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.tasks.push(Box::new(f));
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn on_finished<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Status) + Send + 'static,
    {
        self.on_finished = Some(Box::new(f));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGroup")
            .field("tasks", &self.tasks.len())
            .field("ttl", &self.ttl)
            .field("on_finished", &self.on_finished.is_some())
            .finish()
    }
}
