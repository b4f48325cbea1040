// Bounded work queue with backpressure
// Decouples network reception from CPU-bound validation and encoding

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// A multi-producer/multi-consumer queue bounded by record count
///
/// Key properties:
/// - `push()` blocks while the queue is full, fails once it is closed
/// - `pop()` blocks while the queue is empty, returns `None` only after
///   the queue has been closed AND drained
/// - FIFO: two pushes ordered on one producer are popped in that order
///
/// Clones share the same underlying queue.
pub struct RecordQueue<T> {
    inner: Arc<Mutex<QueueInner<T>>>,
    capacity: usize,
    not_full: Arc<Condvar>,
    not_empty: Arc<Condvar>,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> RecordQueue<T> {
    pub fn new(capacity: usize) -> Self {
        RecordQueue {
            inner: Arc::new(Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            })),
            capacity,
            not_full: Arc::new(Condvar::new()),
            not_empty: Arc::new(Condvar::new()),
        }
    }

    /// Push a record, blocking while the queue is at capacity.
    /// Returns `Err(PushError::Closed)` if the queue is (or becomes) closed.
    pub fn push(&self, item: T) -> Result<(), PushError> {
        let mut inner = self.inner.lock().unwrap();

        while inner.items.len() >= self.capacity && !inner.closed {
            inner = self.not_full.wait(inner).unwrap();
        }
        if inner.closed {
            return Err(PushError::Closed);
        }

        inner.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking push variant: overflow is reported instead of waited out
    pub fn try_push(&self, item: T) -> Result<(), TryPushError> {
        let mut inner = self.inner.lock().unwrap();

        if inner.closed {
            return Err(TryPushError::Closed);
        }
        if inner.items.len() >= self.capacity {
            return Err(TryPushError::Full);
        }

        inner.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pop a record, blocking while the queue is empty.
    /// Returns `None` once the queue is closed and fully drained; that is
    /// the shutdown signal for workers.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();

        while inner.items.is_empty() && !inner.closed {
            inner = self.not_empty.wait(inner).unwrap();
        }
        if inner.items.is_empty() {
            return None;
        }

        let item = inner.items.pop_front();
        self.not_full.notify_one();
        item
    }

    /// Close the queue. Idempotent; wakes every blocked producer and
    /// consumer. Remaining items are still drained by `pop`.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// Clones share the same underlying queue
impl<T> Clone for RecordQueue<T> {
    fn clone(&self) -> Self {
        RecordQueue {
            inner: Arc::clone(&self.inner),
            capacity: self.capacity,
            not_full: Arc::clone(&self.not_full),
            not_empty: Arc::clone(&self.not_empty),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    Closed,
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::Closed => write!(f, "queue is closed"),
        }
    }
}

impl std::error::Error for PushError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPushError {
    Closed,
    Full,
}

impl std::fmt::Display for TryPushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TryPushError::Closed => write!(f, "queue is closed"),
            TryPushError::Full => write!(f, "queue is full"),
        }
    }
}

impl std::error::Error for TryPushError {}
