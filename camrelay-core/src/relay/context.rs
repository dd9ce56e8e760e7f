//! State shared by the ingest path, the worker and the command server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::handoff::HandoffQueue;
use crate::relay::types::PendingItem;

// ── StreamingFlag ────────────────────────────────────────────────

/// Gates transmission of image fragments. Headers are always sent.
///
/// Readers tolerate a stale value for one frame, so relaxed ordering is
/// enough.
#[derive(Debug, Clone)]
pub struct StreamingFlag(Arc<AtomicBool>);

impl StreamingFlag {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for StreamingFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

// ── RelayContext ─────────────────────────────────────────────────

/// Handles to the shared relay state, cloned into each subsystem at
/// construction.
#[derive(Clone)]
pub struct RelayContext {
    pub queue: Arc<HandoffQueue<PendingItem>>,
    pub streaming: StreamingFlag,
    pub destination: SocketAddr,
}

impl RelayContext {
    pub fn new(destination: SocketAddr, streaming: StreamingFlag) -> Self {
        Self {
            queue: Arc::new(HandoffQueue::new()),
            streaming,
            destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_defaults_to_enabled_and_is_shared() {
        let flag = StreamingFlag::default();
        let other = flag.clone();
        assert!(other.is_enabled());
        flag.set(false);
        assert!(!other.is_enabled());
    }

    #[test]
    fn context_clones_share_queue() {
        let ctx = RelayContext::new("127.0.0.1:9000".parse().unwrap(), StreamingFlag::new(false));
        let copy = ctx.clone();
        assert!(Arc::ptr_eq(&ctx.queue, &copy.queue));
        assert!(!copy.streaming.is_enabled());
    }
}
