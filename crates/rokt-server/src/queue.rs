//! Bounded priority queue with backpressure for the C8 work pipeline.
//!
//! Unlike a plain bounded FIFO, tasks must be served highest-priority
//! first with FIFO among equals (§4.8), and workers need to block until
//! work arrives rather than spin — so this is a `Mutex` + `Condvar`
//! guarded `BinaryHeap`, not a lock-free `ArrayQueue` (§5 "the priority
//! queue is guarded by one mutex plus a condition variable").

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Result of attempting to push to a full queue.
#[derive(Debug)]
pub enum PushResult<T> {
    Ok,
    Backpressure(T),
}

struct Entry<T> {
    priority: u8,
    sequence: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    /// Higher priority first; among equal priorities, earlier sequence
    /// number (FIFO) first. `BinaryHeap` is a max-heap, so FIFO requires
    /// reversing the sequence comparison.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct Inner<T> {
    heap: BinaryHeap<Entry<T>>,
    next_sequence: u64,
    capacity: usize,
    closed: bool,
}

/// A bounded, priority-ordered queue guarded by a mutex and condvar.
pub struct PriorityQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
}

impl<T> PriorityQueue<T> {
    /// Creates a new bounded priority queue.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_sequence: 0,
                capacity,
                closed: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Attempts to push an item with the given priority. Returns
    /// `Backpressure(item)` if the queue is at capacity (§4.8 admission
    /// control: callers reply 503 in this case).
    pub fn try_push(&self, priority: u8, item: T) -> PushResult<T> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        if inner.heap.len() >= inner.capacity {
            return PushResult::Backpressure(item);
        }
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.heap.push(Entry { priority, sequence, item });
        drop(inner);
        self.not_empty.notify_one();
        PushResult::Ok
    }

    /// Blocks until an item is available or the queue is closed and
    /// drained, then returns it. Returns `None` only after `close()` has
    /// been called and no items remain.
    pub fn pop_blocking(&self) -> Option<T> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        loop {
            if let Some(entry) = inner.heap.pop() {
                return Some(entry.item);
            }
            if inner.closed {
                return None;
            }
            let (guard, _timeout) = self
                .not_empty
                .wait_timeout(inner, Duration::from_millis(1000))
                .expect("queue mutex poisoned");
            inner = guard;
        }
    }

    /// Signals shutdown: wakes all waiting workers so they can observe
    /// `closed` once the queue drains.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.closed = true;
        drop(inner);
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn higher_priority_served_first() {
        let q = PriorityQueue::new(10);
        assert!(matches!(q.try_push(1, "low"), PushResult::Ok));
        assert!(matches!(q.try_push(10, "high"), PushResult::Ok));
        assert!(matches!(q.try_push(5, "mid"), PushResult::Ok));

        assert_eq!(q.pop_blocking(), Some("high"));
        assert_eq!(q.pop_blocking(), Some("mid"));
        assert_eq!(q.pop_blocking(), Some("low"));
    }

    #[test]
    fn fifo_among_equal_priority() {
        let q = PriorityQueue::new(10);
        q.try_push(5, 1);
        q.try_push(5, 2);
        q.try_push(5, 3);

        assert_eq!(q.pop_blocking(), Some(1));
        assert_eq!(q.pop_blocking(), Some(2));
        assert_eq!(q.pop_blocking(), Some(3));
    }

    #[test]
    fn backpressure_when_full() {
        let q = PriorityQueue::new(2);
        assert!(matches!(q.try_push(1, "a"), PushResult::Ok));
        assert!(matches!(q.try_push(1, "b"), PushResult::Ok));
        match q.try_push(1, "c") {
            PushResult::Backpressure(v) => assert_eq!(v, "c"),
            PushResult::Ok => panic!("expected backpressure"),
        }
    }

    #[test]
    fn close_wakes_blocked_pop_with_none() {
        let q = Arc::new(PriorityQueue::<i32>::new(4));
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.pop_blocking());
        thread::sleep(Duration::from_millis(50));
        q.close();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn len_and_capacity_report_correctly() {
        let q = PriorityQueue::new(5);
        assert_eq!(q.capacity(), 5);
        assert!(q.is_empty());
        q.try_push(1, "x");
        assert_eq!(q.len(), 1);
    }

    #[test]
    #[should_panic(expected = "queue capacity must be positive")]
    fn zero_capacity_panics() {
        let _q: PriorityQueue<i32> = PriorityQueue::new(0);
    }
}
