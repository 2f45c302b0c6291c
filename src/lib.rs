//! Tidepool - a work-stealing thread pool with elastic overflow workers
//!
//! A fixed set of primary workers, each with its own pair of local deques,
//! runs short tasks and steals from its neighbours when idle. Secondary
//! workers are started on demand, drain the pool-wide queues, and expire
//! after staying idle for a number of monitor ticks.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use tidepool::prelude::*;
//!
//! let pool = ThreadPool::new(Config::default())?;
//!
//! // Single task, result through a handle
//! let handle = pool.commit(|| (0..100).sum::<u64>())?;
//! assert_eq!(handle.wait()?, 4950);
//!
//! // Group of tasks under one deadline
//! let group = TaskGroup::new()
//!     .add_task(|| println!("a"))
//!     .add_task(|| println!("b"))
//!     .on_finished(|status| println!("group done: {}", status));
//! let status = pool.submit(group, Duration::from_secs(1));
//! assert!(status.is_ok());
//! # Ok::<(), tidepool::Error>(())
//! ```
//!
//! # Features
//!
//! - **Work Stealing**: Primary workers steal from a fixed window of peers
//! - **Elastic Workers**: Secondary workers grow under load and expire when idle
//! - **Priority Path**: Prioritized and long-running work bypasses primary workers
//! - **Task Groups**: Shared deadline, aggregate status and completion callback
//! - **Queues**: Blocking, priority, work-stealing and ring buffer queues usable on their own

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod status;

pub use config::{Config, ConfigBuilder, SchedPolicy};
pub use error::{Error, Result};
pub use executor::{TaskGroup, TaskHandle, WaitOutcome};
pub use pool::{Destination, DispatchHint, PoolStats, ThreadPool};
pub use status::Status;
