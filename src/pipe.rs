//! A typed, bounded, blocking, shutdown-able FIFO between two operator
//! workers (§4.3). The teacher crate has no concurrency of its own to
//! draw on; this follows §9's design note directly — the runtime's
//! lightest unit of concurrency (`std::thread`) needs a channel with a
//! shutdown signal that wakes blocked removers, which `std::sync::mpsc`
//! does not provide, so it's built from `Mutex` + `Condvar` over a
//! `VecDeque`, shared between producer and consumer via `Arc`.
//!
//! `Pipe<T>` is generic so the same implementation backs record pipes
//! between relational operators as well as any other typed stream the
//! engine needs (e.g. un-typed control signals in tests).

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

struct State<T> {
    queue: VecDeque<T>,
    shut_down: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

/// A cheaply-cloneable handle to a bounded pipe. Clones share the same
/// underlying queue — cloning is how a producer and a consumer each get
/// their own handle to the same pipe, not how you duplicate the stream.
pub struct Pipe<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pipe<T> {
    fn clone(&self) -> Self {
        Pipe { inner: self.inner.clone() }
    }
}

impl<T> Pipe<T> {
    pub fn new(capacity: usize) -> Pipe<T> {
        assert!(capacity > 0, "pipe capacity must be positive");
        Pipe {
            inner: Arc::new(Inner {
                state: Mutex::new(State { queue: VecDeque::new(), shut_down: false }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Blocks while the pipe is full and not shut down, then enqueues
    /// `value`. Panics if called after `shutdown()` — `insert` after
    /// shutdown is a producer-side logic error, not a runtime condition
    /// callers should handle.
    pub fn insert(&self, value: T) {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            assert!(!state.shut_down, "insert() called on a shut-down pipe");
            if state.queue.len() < self.inner.capacity {
                break;
            }
            state = self.inner.not_full.wait(state).unwrap();
        }
        state.queue.push_back(value);
        self.inner.not_empty.notify_one();
    }

    /// Blocks until either a value is available (returns `Some`) or the
    /// pipe has been shut down and drained (returns `None`).
    pub fn remove(&self) -> Option<T> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if let Some(v) = state.queue.pop_front() {
                self.inner.not_full.notify_one();
                return Some(v);
            }
            if state.shut_down {
                return None;
            }
            state = self.inner.not_empty.wait(state).unwrap();
        }
    }

    /// Producer-side close. Idempotent. Wakes every blocked `remove`
    /// caller so they can drain the remainder and observe EOF.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if state.shut_down {
            return;
        }
        state.shut_down = true;
        drop(state);
        self.inner.not_full.notify_all();
        self.inner.not_empty.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.state.lock().unwrap().shut_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order_and_shutdown_drain() {
        let p: Pipe<i32> = Pipe::new(100);
        for i in 0..50 {
            p.insert(i);
        }
        p.shutdown();
        let mut out = vec![];
        while let Some(v) = p.remove() {
            out.push(v);
        }
        assert_eq!(out, (0..50).collect::<Vec<_>>());
        assert_eq!(p.remove(), None);
    }

    #[test]
    fn blocking_insert_unblocks_on_remove() {
        let p: Pipe<i32> = Pipe::new(2);
        p.insert(1);
        p.insert(2);
        let p2 = p.clone();
        let handle = thread::spawn(move || {
            p2.insert(3); // blocks until a slot frees
            p2.shutdown();
        });
        thread::sleep(Duration::from_millis(20));
        assert_eq!(p.remove(), Some(1));
        handle.join().unwrap();
        assert_eq!(p.remove(), Some(2));
        assert_eq!(p.remove(), Some(3));
        assert_eq!(p.remove(), None);
    }

    #[test]
    fn shutdown_wakes_blocked_remover() {
        let p: Pipe<i32> = Pipe::new(4);
        let p2 = p.clone();
        let handle = thread::spawn(move || p2.remove());
        thread::sleep(Duration::from_millis(20));
        p.shutdown();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn shutdown_is_idempotent() {
        let p: Pipe<i32> = Pipe::new(4);
        p.shutdown();
        p.shutdown();
        assert!(p.is_shut_down());
    }
}
