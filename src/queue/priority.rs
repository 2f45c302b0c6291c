use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;

struct Prioritized<T> {
    priority: i32,
    seq: u64,
    value: T,
}

impl<T> PartialEq for Prioritized<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Prioritized<T> {}

impl<T> PartialOrd for Prioritized<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Prioritized<T> {
    // higher priority first, then earlier insertion
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Heap<T> {
    entries: BinaryHeap<Prioritized<T>>,
    next_seq: u64,
}

/// Max-priority queue. Equal priorities pop in insertion order.
pub struct BlockingPriorityQueue<T> {
    heap: Mutex<Heap<T>>,
}

impl<T> BlockingPriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(Heap {
                entries: BinaryHeap::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn push(&self, value: T, priority: i32) {
        let mut heap = self.heap.lock();
        let seq = heap.next_seq;
        heap.next_seq += 1;
        heap.entries.push(Prioritized {
            priority,
            seq,
            value,
        });
    }

    /// Pops the highest-priority value. May fail under lock contention.
    pub fn try_pop(&self) -> Option<T> {
        let mut heap = self.heap.try_lock()?;
        heap.entries.pop().map(|entry| entry.value)
    }

    pub fn try_pop_batch(&self, out: &mut Vec<T>, max: usize) -> bool {
        let Some(mut heap) = self.heap.try_lock() else {
            return false;
        };
        let before = out.len();
        while out.len() - before < max {
            match heap.entries.pop() {
                Some(entry) => out.push(entry.value),
                None => break,
            }
        }
        out.len() > before
    }

    pub fn peek_priority(&self) -> Option<i32> {
        self.heap.lock().entries.peek().map(|entry| entry.priority)
    }

    /// Removes every queued value and returns how many there were.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(&mut self.heap.lock().entries);
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().entries.is_empty()
    }
}

impl<T> Default for BlockingPriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BlockingPriorityQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingPriorityQueue")
            .field("len", &self.len())
            .finish()
    }
}
