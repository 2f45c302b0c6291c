use crate::error::{Error, Result};
use std::time::Duration;

/// Lowest OS scheduling priority accepted for worker threads.
pub const THREAD_MIN_PRIORITY: i32 = 0;
/// Highest OS scheduling priority accepted for worker threads.
pub const THREAD_MAX_PRIORITY: i32 = 99;

/// OS scheduling policy applied to worker threads at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedPolicy {
    #[default]
    Other,
    Fifo,
    RoundRobin,
}

impl SchedPolicy {
    /// Maps a raw `SCHED_*` value; anything unrecognized becomes `Other`.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => SchedPolicy::Fifo,
            2 => SchedPolicy::RoundRobin,
            _ => SchedPolicy::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed primary workers, never resized while the pool runs.
    pub primary_threads: usize,
    /// Secondary workers brought up at start.
    pub secondary_threads: usize,
    /// Ceiling on primary + secondary workers.
    pub max_threads: usize,
    /// How many following peers a primary worker may steal from.
    pub steal_range: usize,

    pub batch_tasks: bool,
    pub local_batch_size: usize,
    pub pool_batch_size: usize,
    pub steal_batch_size: usize,

    /// Empty rounds a primary worker spins through before parking.
    pub primary_busy_epoch: u32,
    pub primary_idle_interval: Duration,
    /// Monitor ticks an idle secondary worker survives.
    pub secondary_ttl: u32,
    /// How long an idle secondary worker waits on the pool queue per round.
    pub queue_empty_interval: Duration,

    pub monitor_enable: bool,
    pub monitor_span: Duration,

    pub primary_policy: SchedPolicy,
    pub secondary_policy: SchedPolicy,
    pub primary_priority: i32,
    pub secondary_priority: i32,
    pub bind_cpu: bool,

    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_threads: 8,
            secondary_threads: 0,
            max_threads: 16,
            steal_range: 2,

            batch_tasks: false,
            local_batch_size: 2,
            pool_batch_size: 2,
            steal_batch_size: 2,

            primary_busy_epoch: 10,
            primary_idle_interval: Duration::from_millis(3),
            secondary_ttl: 10,
            queue_empty_interval: Duration::from_millis(3),

            monitor_enable: false,
            monitor_span: Duration::from_secs(5),

            primary_policy: SchedPolicy::Other,
            secondary_policy: SchedPolicy::Other,
            primary_priority: THREAD_MIN_PRIORITY,
            secondary_priority: THREAD_MIN_PRIORITY,
            bind_cpu: false,

            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "tidepool".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary_threads == 0 {
            return Err(Error::config("primary_threads must be > 0"));
        }

        if self.primary_threads + self.secondary_threads > self.max_threads {
            return Err(Error::config(
                "max_threads is less than primary + secondary threads",
            ));
        }

        if self.monitor_enable && self.monitor_span.is_zero() {
            return Err(Error::config("monitor_span must be > 0 when the monitor is enabled"));
        }

        if self.batch_tasks
            && (self.local_batch_size == 0 || self.pool_batch_size == 0 || self.steal_batch_size == 0)
        {
            return Err(Error::config("batch sizes must be > 0 in batch mode"));
        }

        Ok(())
    }

    /// Effective steal range, never reaching past the other primary workers.
    pub fn effective_steal_range(&self) -> usize {
        self.steal_range.min(self.primary_threads.saturating_sub(1))
    }

    /// Room left for secondary workers under `max_threads`.
    pub fn secondary_capacity(&self) -> usize {
        self.max_threads.saturating_sub(self.primary_threads)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn primary_threads(mut self, n: usize) -> Self {
        self.config.primary_threads = n;
        self
    }

    pub fn secondary_threads(mut self, n: usize) -> Self {
        self.config.secondary_threads = n;
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.config.max_threads = n;
        self
    }

    pub fn steal_range(mut self, range: usize) -> Self {
        self.config.steal_range = range;
        self
    }

    pub fn batch_tasks(mut self, enable: bool) -> Self {
        self.config.batch_tasks = enable;
        self
    }

    pub fn batch_sizes(mut self, local: usize, pool: usize, steal: usize) -> Self {
        self.config.local_batch_size = local;
        self.config.pool_batch_size = pool;
        self.config.steal_batch_size = steal;
        self
    }

    pub fn primary_busy_epoch(mut self, epoch: u32) -> Self {
        self.config.primary_busy_epoch = epoch;
        self
    }

    pub fn primary_idle_interval(mut self, interval: Duration) -> Self {
        self.config.primary_idle_interval = interval;
        self
    }

    pub fn secondary_ttl(mut self, ttl: u32) -> Self {
        self.config.secondary_ttl = ttl;
        self
    }

    pub fn queue_empty_interval(mut self, interval: Duration) -> Self {
        self.config.queue_empty_interval = interval;
        self
    }

    pub fn monitor(mut self, enable: bool, span: Duration) -> Self {
        self.config.monitor_enable = enable;
        self.config.monitor_span = span;
        self
    }

    pub fn primary_sched(mut self, policy: SchedPolicy, priority: i32) -> Self {
        self.config.primary_policy = policy;
        self.config.primary_priority = priority;
        self
    }

    pub fn secondary_sched(mut self, policy: SchedPolicy, priority: i32) -> Self {
        self.config.secondary_policy = policy;
        self.config.secondary_priority = priority;
        self
    }

    pub fn bind_cpu(mut self, bind: bool) -> Self {
        self.config.bind_cpu = bind;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_steal_range(), 2);
        assert_eq!(config.secondary_capacity(), 8);
    }

    #[test]
    fn test_thread_sum_exceeds_max() {
        let result = Config::builder()
            .primary_threads(10)
            .secondary_threads(7)
            .max_threads(16)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_primary_rejected() {
        assert!(Config::builder().primary_threads(0).build().is_err());
    }

    #[test]
    fn test_monitor_span_must_be_positive() {
        let result = Config::builder().monitor(true, Duration::ZERO).build();
        assert!(result.is_err());

        let result = Config::builder().monitor(false, Duration::ZERO).build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_batch_sizes_checked_in_batch_mode() {
        assert!(Config::builder()
            .batch_tasks(true)
            .batch_sizes(2, 0, 2)
            .build()
            .is_err());
        assert!(Config::builder()
            .batch_tasks(false)
            .batch_sizes(2, 0, 2)
            .build()
            .is_ok());
    }

    #[test]
    fn test_steal_range_bounded_by_peers() {
        let config = Config::builder()
            .primary_threads(2)
            .steal_range(5)
            .build()
            .unwrap();
        assert_eq!(config.effective_steal_range(), 1);

        let config = Config::builder()
            .primary_threads(1)
            .max_threads(4)
            .build()
            .unwrap();
        assert_eq!(config.effective_steal_range(), 0);
    }

    #[test]
    fn test_policy_from_raw() {
        assert_eq!(SchedPolicy::from_raw(0), SchedPolicy::Other);
        assert_eq!(SchedPolicy::from_raw(1), SchedPolicy::Fifo);
        assert_eq!(SchedPolicy::from_raw(2), SchedPolicy::RoundRobin);
        assert_eq!(SchedPolicy::from_raw(42), SchedPolicy::Other);
    }
}
