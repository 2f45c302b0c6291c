use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Double-ended queue owned by one worker.
///
/// The owner pushes and pops at the front, so it sees its most recent work
/// first. Thieves take from the back, the oldest work, away from the
/// owner's hot end. Every operation except `push` gives up immediately if
/// the lock is held.
pub struct WorkStealingDeque<T> {
    deque: Mutex<VecDeque<T>>,
    len: AtomicUsize,
}

impl<T> WorkStealingDeque<T> {
    pub fn new() -> Self {
        Self {
            deque: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Pushes at the owner end, yielding until the lock is free.
    pub fn push(&self, value: T) {
        loop {
            if let Some(mut deque) = self.deque.try_lock() {
                deque.push_front(value);
                self.len.store(deque.len(), Ordering::Release);
                return;
            }
            thread::yield_now();
        }
    }

    /// Pushes at the owner end if the lock is free, handing the value back otherwise.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        match self.deque.try_lock() {
            Some(mut deque) => {
                deque.push_front(value);
                self.len.store(deque.len(), Ordering::Release);
                Ok(())
            }
            None => Err(value),
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        if self.len.load(Ordering::Acquire) == 0 {
            return None;
        }
        let mut deque = self.deque.try_lock()?;
        let value = deque.pop_front();
        self.len.store(deque.len(), Ordering::Release);
        value
    }

    pub fn try_pop_batch(&self, out: &mut Vec<T>, max: usize) -> bool {
        if max == 0 || self.len.load(Ordering::Acquire) == 0 {
            return false;
        }
        let Some(mut deque) = self.deque.try_lock() else {
            return false;
        };
        let take = max.min(deque.len());
        out.extend(deque.drain(..take));
        self.len.store(deque.len(), Ordering::Release);
        take > 0
    }

    pub fn try_steal(&self) -> Option<T> {
        if self.len.load(Ordering::Acquire) == 0 {
            return None;
        }
        let mut deque = self.deque.try_lock()?;
        let value = deque.pop_back();
        self.len.store(deque.len(), Ordering::Release);
        value
    }

    /// Steals up to `max` values, oldest first.
    pub fn try_steal_batch(&self, out: &mut Vec<T>, max: usize) -> bool {
        if max == 0 || self.len.load(Ordering::Acquire) == 0 {
            return false;
        }
        let Some(mut deque) = self.deque.try_lock() else {
            return false;
        };
        let before = out.len();
        while out.len() - before < max {
            match deque.pop_back() {
                Some(value) => out.push(value),
                None => break,
            }
        }
        self.len.store(deque.len(), Ordering::Release);
        out.len() > before
    }

    /// Approximate length, read without taking the lock.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for WorkStealingDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for WorkStealingDeque<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkStealingDeque")
            .field("len", &self.len())
            .finish()
    }
}
