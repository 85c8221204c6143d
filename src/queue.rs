//! Bounded producer/consumer hand-off between capture and persistence.
//!
//! Overflow policy is drop-oldest: `push` never blocks. When the queue is full
//! the oldest queued element is evicted and handed back to the caller so it can
//! be counted and logged. `pop` blocks until an element arrives or the queue is
//! closed and drained.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::frame::Frame;

pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Result of a non-blocking push.
#[derive(Debug)]
pub enum PushOutcome<T> {
    Enqueued,
    /// The queue was full; this element was evicted to make room.
    DroppedOldest(T),
    /// The queue was closed; the pushed element is returned untouched.
    Closed(T),
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct BoundedFrameQueue<T = Frame> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> BoundedFrameQueue<T> {
    /// Create a queue holding at most `capacity` elements (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert at the back, evicting the oldest element if full.
    pub fn push(&self, item: T) -> PushOutcome<T> {
        let mut state = self.lock();
        if state.closed {
            return PushOutcome::Closed(item);
        }

        let evicted = if state.items.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            state.items.pop_front()
        } else {
            None
        };

        state.items.push_back(item);
        drop(state);
        self.available.notify_one();

        match evicted {
            Some(old) => PushOutcome::DroppedOldest(old),
            None => PushOutcome::Enqueued,
        }
    }

    /// Block until an element is available. Returns `None` once the queue is
    /// closed and empty.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like `pop`, but gives up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            let now = Instant::now();
            if state.closed || now >= deadline {
                return None;
            }
            let (next, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }
    }

    /// Refuse further pushes and wake all waiting consumers. Queued elements
    /// remain poppable.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total elements evicted by drop-oldest since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<T> Default for BoundedFrameQueue<T> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn drain<T>(q: &BoundedFrameQueue<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(item) = q.pop_timeout(Duration::from_millis(0)) {
            out.push(item);
        }
        out
    }

    #[test]
    fn retains_most_recent_elements_in_fifo_order() {
        for capacity in 1..6usize {
            for pushes in 0..20u32 {
                let q = BoundedFrameQueue::new(capacity);
                let mut evicted = Vec::new();
                for i in 0..pushes {
                    if let PushOutcome::DroppedOldest(old) = q.push(i) {
                        evicted.push(old);
                    }
                }
                let kept = drain(&q);
                let start = pushes.saturating_sub(capacity as u32);
                assert_eq!(kept, (start..pushes).collect::<Vec<_>>());
                assert_eq!(evicted, (0..start).collect::<Vec<_>>());
                assert_eq!(q.dropped(), start as u64);
            }
        }
    }

    #[test]
    fn interleaved_pops_keep_survivor_order() {
        let q = BoundedFrameQueue::new(3);
        for i in 0..3 {
            q.push(i);
        }
        assert_eq!(q.pop(), Some(0));
        q.push(3);
        q.push(4);
        assert_eq!(q.dropped(), 1);
        assert_eq!(drain(&q), vec![2, 3, 4]);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let q = BoundedFrameQueue::new(0);
        assert_eq!(q.capacity(), 1);
        q.push("a");
        assert!(matches!(q.push("b"), PushOutcome::DroppedOldest("a")));
        assert_eq!(q.pop(), Some("b"));
    }

    #[test]
    fn close_drains_then_ends() {
        let q = BoundedFrameQueue::new(4);
        q.push(1);
        q.push(2);
        q.close();
        assert!(matches!(q.push(3), PushOutcome::Closed(3)));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn pop_blocks_until_producer_pushes() {
        let q = Arc::new(BoundedFrameQueue::new(2));
        let consumer = {
            let q = q.clone();
            thread::spawn(move || {
                let mut got = Vec::new();
                while let Some(v) = q.pop() {
                    got.push(v);
                }
                got
            })
        };
        thread::sleep(Duration::from_millis(20));
        q.push(7u32);
        thread::sleep(Duration::from_millis(20));
        q.push(8u32);
        q.close();
        let got = consumer.join().unwrap();
        assert_eq!(got, vec![7, 8]);
    }

    #[test]
    fn pop_timeout_returns_none_when_idle() {
        let q: BoundedFrameQueue<u8> = BoundedFrameQueue::new(2);
        let start = Instant::now();
        assert_eq!(q.pop_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
