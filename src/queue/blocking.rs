use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// FIFO queue with blocking, timed and contention-tolerant pops.
pub struct BlockingQueue<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Condvar,
    // mirrors queue.len(), lets try_pop skip the lock when empty
    len: AtomicUsize,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            len: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, value: T) {
        {
            let mut queue = self.queue.lock();
            queue.push_back(value);
            self.len.store(queue.len(), Ordering::Release);
        }
        self.ready.notify_one();
    }

    /// Blocks until a value is available.
    pub fn wait_pop(&self) -> T {
        let mut queue = self.queue.lock();
        loop {
            if let Some(value) = queue.pop_front() {
                self.len.store(queue.len(), Ordering::Release);
                return value;
            }
            self.ready.wait(&mut queue);
        }
    }

    /// Pops without blocking. May fail while another thread holds the lock.
    pub fn try_pop(&self) -> Option<T> {
        if self.len.load(Ordering::Acquire) == 0 {
            return None;
        }
        let mut queue = self.queue.try_lock()?;
        let value = queue.pop_front();
        self.len.store(queue.len(), Ordering::Release);
        value
    }

    /// Moves up to `max` values into `out` under one lock acquisition.
    /// Returns whether anything was popped.
    pub fn try_pop_batch(&self, out: &mut Vec<T>, max: usize) -> bool {
        if max == 0 || self.len.load(Ordering::Acquire) == 0 {
            return false;
        }
        let Some(mut queue) = self.queue.try_lock() else {
            return false;
        };
        let take = max.min(queue.len());
        out.extend(queue.drain(..take));
        self.len.store(queue.len(), Ordering::Release);
        take > 0
    }

    /// Waits up to `timeout` for a value.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            let timed_out = self
                .ready
                .wait_while_for(&mut queue, |q| q.is_empty(), timeout)
                .timed_out();
            if timed_out && queue.is_empty() {
                return None;
            }
        }
        let value = queue.pop_front();
        self.len.store(queue.len(), Ordering::Release);
        value
    }

    /// Removes every queued value and returns how many there were.
    /// Values are dropped after the lock is released.
    pub fn clear(&self) -> usize {
        let drained = {
            let mut queue = self.queue.lock();
            self.len.store(0, Ordering::Release);
            std::mem::take(&mut *queue)
        };
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("len", &self.len.load(Ordering::Relaxed))
            .finish()
    }
}
