/// Counters for one primary worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub index: usize,
    pub tasks_executed: u64,
    pub tasks_stolen: u64,
    pub running: bool,
}

/// Point-in-time snapshot of a pool. Counters are read without
/// synchronizing with the workers, so totals may lag slightly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub primaries: Vec<WorkerStats>,
    pub secondary_workers: usize,
    pub queued_tasks: usize,
    pub queued_priority_tasks: usize,
}

impl PoolStats {
    pub fn tasks_executed(&self) -> u64 {
        self.primaries.iter().map(|w| w.tasks_executed).sum()
    }

    pub fn tasks_stolen(&self) -> u64 {
        self.primaries.iter().map(|w| w.tasks_stolen).sum()
    }

    /// Whether every primary worker is executing a task.
    pub fn is_busy(&self) -> bool {
        !self.primaries.is_empty() && self.primaries.iter().all(|w| w.running)
    }
}
