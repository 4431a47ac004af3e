//! Bounded FIFO queue connecting adjacent pipeline stages.
//!
//! A plain `Mutex<VecDeque<T>>` + two `Condvar`s (not-empty, not-full) rather than a
//! channel crate — no `crossbeam`/`flume` dependency is carried for this, since a
//! condvar-guarded deque covers producer/consumer blocking directly.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 64;

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct BoundedQueue<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedQueue {
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Blocks until there is room, then pushes `item`. Returns `false` (dropping
    /// `item`) if the queue has been closed in the meantime.
    pub fn push_blocking(&self, item: T) -> bool {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        loop {
            if guard.closed {
                return false;
            }
            if guard.items.len() < self.capacity {
                guard.items.push_back(item);
                self.not_empty.notify_one();
                return true;
            }
            guard = self.not_full.wait(guard).expect("queue mutex poisoned");
        }
    }

    /// Non-blocking push: fails if at capacity or closed.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        if guard.closed || guard.items.len() >= self.capacity {
            return Err(item);
        }
        guard.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocks until an item is available or the queue is closed and drained.
    pub fn pop_blocking(&self) -> Option<T> {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        loop {
            if let Some(item) = guard.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            guard = self.not_empty.wait(guard).expect("queue mutex poisoned");
        }
    }

    /// Blocks up to `timeout` for an item; `None` means either timed out or the
    /// queue is closed and empty (callers distinguish via [`Self::is_closed`]).
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let guard = self.inner.lock().expect("queue mutex poisoned");
        let (mut guard, _) = self
            .not_empty
            .wait_timeout_while(guard, timeout, |g| g.items.is_empty() && !g.closed)
            .expect("queue mutex poisoned");
        let item = guard.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Marks the queue closed: no further pushes succeed, and pops drain remaining
    /// items before returning `None`.
    pub fn close(&self) {
        let mut guard = self.inner.lock().expect("queue mutex poisoned");
        guard.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("queue mutex poisoned").closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_then_pop_preserves_fifo_order() {
        let q = BoundedQueue::new(4);
        q.push_blocking(1);
        q.push_blocking(2);
        assert_eq!(q.pop_blocking(), Some(1));
        assert_eq!(q.pop_blocking(), Some(2));
    }

    #[test]
    fn try_push_fails_when_full() {
        let q = BoundedQueue::new(1);
        assert!(q.try_push(1).is_ok());
        assert_eq!(q.try_push(2), Err(2));
    }

    #[test]
    fn close_unblocks_waiting_consumer() {
        let q = Arc::new(BoundedQueue::<i32>::new(4));
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.pop_blocking());
        std::thread::sleep(Duration::from_millis(20));
        q.close();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn blocking_push_waits_for_space_then_succeeds() {
        let q = Arc::new(BoundedQueue::new(1));
        q.push_blocking(1);
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.push_blocking(2));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(q.pop_blocking(), Some(1));
        assert!(handle.join().unwrap());
        assert_eq!(q.pop_blocking(), Some(2));
    }
}
