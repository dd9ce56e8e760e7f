//! Single-slot, latest-wins handoff between the capture thread and the
//! encode/transmit worker.
//!
//! The producer never waits for the consumer: publishing over an
//! unconsumed item drops the older one. The consumer waits on a condition
//! variable with a timeout so it can observe [`shutdown`](HandoffQueue::shutdown)
//! even when no frames arrive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Outcome of [`HandoffQueue::take_or_wait`].
#[derive(Debug)]
pub enum Handoff<T> {
    /// An item was pending (or arrived during the wait).
    Ready(T),
    /// The wait timed out with nothing pending.
    Idle,
    /// The queue was shut down and holds nothing more.
    Closed,
}

impl<T> Handoff<T> {
    /// The item, if one was handed over.
    pub fn into_item(self) -> Option<T> {
        match self {
            Handoff::Ready(item) => Some(item),
            Handoff::Idle | Handoff::Closed => None,
        }
    }
}

struct Slot<T> {
    pending: Option<T>,
    closed: bool,
}

/// Capacity-one channel with overwrite-on-publish semantics.
pub struct HandoffQueue<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
    published: AtomicU64,
    superseded: AtomicU64,
}

impl<T> HandoffQueue<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                pending: None,
                closed: false,
            }),
            ready: Condvar::new(),
            published: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hand `item` to the consumer, replacing any unconsumed item.
    ///
    /// After [`shutdown`](Self::shutdown) the item is dropped instead.
    /// Replaced and rejected items are dropped outside the lock.
    pub fn publish(&self, item: T) {
        let displaced = {
            let mut slot = self.lock();
            if slot.closed {
                Some(item)
            } else {
                let previous = slot.pending.replace(item);
                self.published.fetch_add(1, Ordering::Relaxed);
                if previous.is_some() {
                    self.superseded.fetch_add(1, Ordering::Relaxed);
                }
                previous
            }
        };
        self.ready.notify_all();
        drop(displaced);
    }

    /// Take the pending item, waiting up to `timeout` for one to arrive.
    ///
    /// A pending item is returned even after shutdown, so the consumer
    /// drains before it sees [`Handoff::Closed`].
    pub fn take_or_wait(&self, timeout: Duration) -> Handoff<T> {
        let mut slot = self.lock();
        if let Some(item) = slot.pending.take() {
            return Handoff::Ready(item);
        }
        if slot.closed {
            return Handoff::Closed;
        }

        let (mut slot, _) = self
            .ready
            .wait_timeout_while(slot, timeout, |s| s.pending.is_none() && !s.closed)
            .unwrap_or_else(|e| e.into_inner());

        match slot.pending.take() {
            Some(item) => Handoff::Ready(item),
            None if slot.closed => Handoff::Closed,
            None => Handoff::Idle,
        }
    }

    /// Close the queue and wake any waiting consumer.
    pub fn shutdown(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Items accepted by [`publish`](Self::publish) so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Items that were replaced before the consumer took them.
    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────
