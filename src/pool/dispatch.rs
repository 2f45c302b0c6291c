use std::sync::atomic::{AtomicUsize, Ordering};

/// Where a committed task should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchHint {
    /// Next primary worker in turn.
    #[default]
    RoundRobin,
    /// A specific primary worker. Out-of-range indices fall back to the pool queue.
    Worker(usize),
    /// The pool-wide queue, drained by every worker.
    Pool,
    /// Slow work, kept off the primary workers.
    LongTask,
}

/// A resolved [`DispatchHint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Primary(usize),
    Pool,
    LongTask,
}

pub(crate) fn resolve(hint: DispatchHint, cursor: &AtomicUsize, primary_count: usize) -> Destination {
    match hint {
        DispatchHint::RoundRobin if primary_count > 0 => {
            let previous = cursor
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                    Some((current + 1) % primary_count)
                })
                .unwrap_or_else(|current| current);
            Destination::Primary(previous % primary_count)
        }
        DispatchHint::Worker(index) if index < primary_count => Destination::Primary(index),
        DispatchHint::LongTask => Destination::LongTask,
        _ => Destination::Pool,
    }
}
