//! Lock-free single-producer/single-consumer ring buffer.
//!
//! Only `head` and `tail` are shared through atomics; slot storage is
//! touched by exactly one side at a time. The split into a `RingProducer`
//! and a `RingConsumer`, neither of which is `Clone`, is what keeps that
//! discipline.

use crossbeam_utils::{Backoff, CachePadded};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared<T> {
    slots: Box<[UnsafeCell<Option<T>>]>,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: a slot is written only by the producer while it lies outside
// [head, tail) and read only by the consumer while it lies inside; the
// release/acquire pair on head/tail orders those accesses.
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Creates a ring holding at most `capacity - 1` values (`capacity` is raised to 2 if smaller).
pub fn lock_free_ring<T: Send>(capacity: usize) -> (RingProducer<T>, RingConsumer<T>) {
    let capacity = capacity.max(2);
    let shared = Arc::new(Shared {
        slots: (0..capacity).map(|_| UnsafeCell::new(None)).collect(),
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });
    (
        RingProducer {
            shared: shared.clone(),
        },
        RingConsumer { shared },
    )
}

pub struct RingProducer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> RingProducer<T> {
    /// Pushes a value, yielding while the ring is full.
    pub fn push(&mut self, value: T) {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % shared.capacity();

        let backoff = Backoff::new();
        while next == shared.head.load(Ordering::Acquire) {
            backoff.snooze();
        }

        // SAFETY: `tail` is outside [head, tail), the consumer won't touch it.
        unsafe {
            *shared.slots[tail].get() = Some(value);
        }
        shared.tail.store(next, Ordering::Release);
    }

    pub fn is_full(&self) -> bool {
        let shared = &*self.shared;
        let next = (shared.tail.load(Ordering::Relaxed) + 1) % shared.capacity();
        next == shared.head.load(Ordering::Acquire)
    }
}

pub struct RingConsumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> RingConsumer<T> {
    pub fn try_pop(&mut self) -> Option<T> {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        if head == shared.tail.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: `head` is inside [head, tail), the producer won't touch it.
        let value = unsafe { (*shared.slots[head].get()).take() };
        shared
            .head
            .store((head + 1) % shared.capacity(), Ordering::Release);
        value
    }

    /// Spins until a value arrives.
    pub fn pop(&mut self) -> T {
        let backoff = Backoff::new();
        loop {
            if let Some(value) = self.try_pop() {
                return value;
            }
            backoff.snooze();
        }
    }

    pub fn is_empty(&self) -> bool {
        let shared = &*self.shared;
        shared.head.load(Ordering::Relaxed) == shared.tail.load(Ordering::Acquire)
    }
}

impl<T> std::fmt::Debug for RingProducer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingProducer")
            .field("capacity", &self.shared.capacity())
            .finish()
    }
}

impl<T> std::fmt::Debug for RingConsumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingConsumer")
            .field("capacity", &self.shared.capacity())
            .finish()
    }
}
