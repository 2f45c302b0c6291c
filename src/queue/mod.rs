//! Concurrent queues used by the pool and its workers.
//!
//! The `try_*` operations on the locked queues use `try_lock` and give up
//! when the lock is contended, so a `None`/`false` result means "look
//! somewhere else", not "the queue is empty". Callers retry.

pub mod blocking;
pub mod lock_free_ring;
pub mod priority;
pub mod ring_buffer;
pub mod work_stealing;

pub use blocking::BlockingQueue;
pub use lock_free_ring::{lock_free_ring, RingConsumer, RingProducer};
pub use priority::BlockingPriorityQueue;
pub use ring_buffer::{BoundedRingBuffer, PushPolicy, DEFAULT_RING_CAPACITY};
pub use work_stealing::WorkStealingDeque;
