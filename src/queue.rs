//! Multi-producer multi-consumer FIFO of ready task ids.
//!
//! Workers register themselves before they start consuming, and the
//! initiator waits in [`ReadyQueue::open`] until all of them did. This way no
//! worker can observe an empty, closed queue while the pool is still being
//! built. Consumers block in [`ReadyQueue::pop`] until an id arrives or the
//! queue is closed and drained.

use crate::graph::TaskId;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<TaskId>,
    writers: usize,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct ReadyQueue {
    inner: Mutex<Inner>,
    /// Signalled on push and close.
    available: Condvar,
    /// Signalled on writer registration.
    registered: Condvar,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce one more producer/consumer.
    pub fn register(&self) {
        let mut inner = self.inner.lock();
        inner.writers += 1;
        self.registered.notify_all();
    }

    /// Blocks until at least `expected` workers have registered.
    pub fn open(&self, expected: usize) {
        let mut inner = self.inner.lock();
        while inner.writers < expected && !inner.closed {
            self.registered.wait(&mut inner);
        }
    }

    pub fn writers(&self) -> usize {
        self.inner.lock().writers
    }

    /// Appends a ready id. A closed queue rejects it and returns false.
    #[must_use]
    pub fn push(&self, id: TaskId) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        inner.items.push_back(id);
        drop(inner);
        self.available.notify_one();
        true
    }

    /// Removes the oldest ready id, blocking while the queue is empty and
    /// still open. Returns `None` only once the queue is closed and drained.
    pub fn pop(&self) -> Option<TaskId> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(id) = inner.items.pop_front() {
                return Some(id);
            }
            if inner.closed {
                return None;
            }
            self.available.wait(&mut inner);
        }
    }

    /// Non-blocking: pops exactly `n` ids into `out` if at least `n` are
    /// queued, otherwise leaves the queue untouched and returns false.
    pub fn try_pop_exact(&self, n: usize, out: &mut impl Extend<TaskId>) -> bool {
        let mut inner = self.inner.lock();
        if inner.items.len() < n {
            return false;
        }
        out.extend(inner.items.drain(..n));
        true
    }

    /// Wakes every blocked consumer; subsequent pops on an empty queue
    /// return `None`.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.available.notify_all();
        self.registered.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
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
    fn fifo() {
        let q = ReadyQueue::new();
        for i in 0..5 {
            assert!(q.push(i));
        }
        q.close();
        let popped: Vec<_> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(popped, [0, 1, 2, 3, 4]);
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn pop_exact_is_all_or_nothing() {
        let q = ReadyQueue::new();
        assert!(q.push(1));
        assert!(q.push(2));
        let mut out = Vec::new();
        assert!(!q.try_pop_exact(3, &mut out));
        assert!(out.is_empty());
        assert_eq!(q.len(), 2);
        assert!(q.try_pop_exact(2, &mut out));
        assert_eq!(out, [1, 2]);
        assert!(q.is_empty());
        assert!(q.try_pop_exact(0, &mut out));
    }

    #[test]
    fn close_releases_blocked_consumers() {
        let q = Arc::new(ReadyQueue::new());
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || q.pop())
            })
            .collect();
        q.close();
        for c in consumers {
            assert_eq!(c.join().unwrap(), None);
        }
    }

    #[test]
    fn blocked_consumer_receives_push() {
        let q = Arc::new(ReadyQueue::new());
        let consumer = {
            let q = q.clone();
            thread::spawn(move || q.pop())
        };
        assert!(q.push(7));
        assert_eq!(consumer.join().unwrap(), Some(7));
    }

    #[test]
    fn open_waits_for_registrations() {
        let q = Arc::new(ReadyQueue::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let q = q.clone();
                thread::spawn(move || q.register())
            })
            .collect();
        q.open(4);
        assert_eq!(q.writers(), 4);
        for w in workers {
            w.join().unwrap();
        }
    }

    #[test]
    fn push_after_close_is_rejected() {
        let q = ReadyQueue::new();
        q.close();
        assert!(!q.push(0));
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }
}
