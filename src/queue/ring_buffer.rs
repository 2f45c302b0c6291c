use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

pub const DEFAULT_RING_CAPACITY: usize = 1024;

/// What `push` does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushPolicy {
    /// Block until a pop frees a slot.
    #[default]
    Wait,
    /// Evict the oldest unread entry.
    Replace,
    /// Discard the new entry.
    Drop,
}

struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    // one slot always stays empty so full and empty differ
    fn is_full(&self) -> bool {
        self.head == (self.tail + 1) % self.capacity()
    }

    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn len(&self) -> usize {
        (self.tail + self.capacity() - self.head) % self.capacity()
    }
}

/// Fixed-capacity circular buffer holding at most `capacity - 1` entries.
pub struct BoundedRingBuffer<T> {
    ring: Mutex<Ring<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedRingBuffer<T> {
    pub fn new() -> Self {
        Self::build(DEFAULT_RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(Error::config("ring buffer capacity must be >= 2"));
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    pub fn push(&self, value: T, policy: PushPolicy) {
        {
            let mut ring = self.ring.lock();
            if ring.is_full() {
                match policy {
                    PushPolicy::Wait => {
                        self.not_full.wait_while(&mut ring, |r| r.is_full());
                    }
                    PushPolicy::Replace => {
                        let head = ring.head;
                        ring.slots[head] = None;
                        ring.head = (head + 1) % ring.capacity();
                    }
                    PushPolicy::Drop => return,
                }
            }
            let tail = ring.tail;
            ring.slots[tail] = Some(value);
            ring.tail = (tail + 1) % ring.capacity();
        }
        self.not_empty.notify_one();
    }

    /// Pops the oldest entry, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T> {
        let value = {
            let mut ring = self.ring.lock();
            if ring.is_empty() {
                self.not_empty
                    .wait_while_for(&mut ring, |r| r.is_empty(), timeout);
                if ring.is_empty() {
                    return Err(Error::timeout("ring buffer pop"));
                }
            }
            let head = ring.head;
            let value = ring.slots[head].take();
            ring.head = (head + 1) % ring.capacity();
            value
        };
        self.not_full.notify_one();
        value.ok_or_else(|| Error::timeout("ring buffer slot was empty"))
    }

    pub fn is_full(&self) -> bool {
        self.ring.lock().is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    pub fn clear(&self) {
        {
            let mut ring = self.ring.lock();
            ring.slots.iter_mut().for_each(|slot| *slot = None);
            ring.head = 0;
            ring.tail = 0;
        }
        self.not_full.notify_all();
    }
}

impl<T> Default for BoundedRingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BoundedRingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ring = self.ring.lock();
        f.debug_struct("BoundedRingBuffer")
            .field("capacity", &ring.capacity())
            .field("len", &ring.len())
            .finish()
    }
}
