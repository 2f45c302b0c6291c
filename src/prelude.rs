pub use crate::config::{Config, ConfigBuilder, SchedPolicy};
pub use crate::error::{Error, Result};
pub use crate::executor::{TaskGroup, TaskHandle, WaitOutcome, MAX_BLOCK_TTL};
pub use crate::pool::{Destination, DispatchHint, PoolStats, ThreadPool};
pub use crate::status::Status;
