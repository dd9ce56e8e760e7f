//! Background encode/transmit worker.
//!
//! ```text
//!            ┌──────────── Idle (timeout) ───────────┐
//!            ▼                                       │
//!   WaitingForFrame ── Ready(item) ──► Processing ───┘
//!            │
//!            └── Closed (shut down + drained) ──► Stopped
//! ```
//!
//! Processing converts and compresses the frame, seals the header with the
//! fragment count, sends the header, and sends the fragments only while
//! the streaming flag is set. Failures affect only the current frame.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::handoff::{Handoff, HandoffQueue};
use crate::relay::context::{RelayContext, StreamingFlag};
use crate::relay::encoder::FrameEncoder;
use crate::relay::transport::{DatagramSink, FrameTransport, SendReport, fragment_count};
use crate::relay::types::PendingItem;

/// Upper bound on how long the worker sleeps before rechecking shutdown.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(200);

// ── Outcome / stats ──────────────────────────────────────────────

/// Result of processing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Sent(SendReport),
    /// Frame had no pixels; nothing was sent.
    Skipped,
}

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub frames_sent: u64,
    pub frames_skipped: u64,
    pub frames_failed: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
}

// ── RelayWorker ──────────────────────────────────────────────────

pub struct RelayWorker<S> {
    queue: Arc<HandoffQueue<PendingItem>>,
    streaming: StreamingFlag,
    encoder: FrameEncoder,
    transport: FrameTransport<S>,
    wait: Duration,
    stats: WorkerStats,
}

impl<S: DatagramSink> RelayWorker<S> {
    pub fn new(context: &RelayContext, encoder: FrameEncoder, transport: FrameTransport<S>) -> Self {
        Self {
            queue: Arc::clone(&context.queue),
            streaming: context.streaming.clone(),
            encoder,
            transport,
            wait: WAIT_TIMEOUT,
            stats: WorkerStats::default(),
        }
    }

    /// Override the wait granularity.
    pub fn with_wait_timeout(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Consume items until the queue is shut down and drained.
    pub fn run(mut self) -> WorkerStats {
        info!("relay worker started");
        loop {
            match self.queue.take_or_wait(self.wait) {
                Handoff::Ready(item) => self.handle(item),
                Handoff::Idle => continue,
                Handoff::Closed => break,
            }
        }

        self.stats.datagrams_sent = self.transport.datagrams_sent();
        self.stats.bytes_sent = self.transport.bytes_sent();
        info!(
            sent = self.stats.frames_sent,
            skipped = self.stats.frames_skipped,
            failed = self.stats.frames_failed,
            published = self.queue.published(),
            superseded = self.queue.superseded(),
            datagrams = self.stats.datagrams_sent,
            bytes = self.stats.bytes_sent,
            "relay worker stopped"
        );
        self.stats
    }

    fn handle(&mut self, item: PendingItem) {
        let sequence = item.sequence;
        match self.process(item) {
            Ok(FrameOutcome::Sent(_)) => self.stats.frames_sent += 1,
            Ok(FrameOutcome::Skipped) => self.stats.frames_skipped += 1,
            Err(e) => {
                warn!(header_seq = sequence, "frame dropped: {e}");
                self.stats.frames_failed += 1;
            }
        }
    }

    /// Encode and transmit one item. The item is consumed either way.
    pub fn process(&mut self, item: PendingItem) -> Result<FrameOutcome> {
        let PendingItem {
            buffer,
            info,
            pts_us,
            sequence,
            header,
        } = item;

        let encoded = self.encoder.encode(buffer.data(), &info)?;
        // Pixels are no longer needed once compressed.
        drop(buffer);

        let Some(image) = encoded else {
            debug!(header_seq = sequence, "empty frame skipped");
            return Ok(FrameOutcome::Skipped);
        };

        let fragments = fragment_count(image.data.len(), self.transport.fragment_size());
        let header = header.seal(fragments);
        let streaming = self.streaming.is_enabled();
        let report = self.transport.send_frame(&header, &image.data, streaming)?;

        debug!(
            header_seq = sequence,
            pts_us,
            objects = header.detection_count(),
            header_len = header.len(),
            fragments,
            streaming,
            "frame sent"
        );
        Ok(FrameOutcome::Sent(report))
    }
}

impl<S: DatagramSink + Send + 'static> RelayWorker<S> {
    /// Run the worker on a dedicated thread.
    pub fn spawn(self) -> io::Result<WorkerHandle> {
        let queue = Arc::clone(&self.queue);
        let thread = thread::Builder::new()
            .name("relay-worker".into())
            .spawn(move || self.run())?;
        Ok(WorkerHandle { queue, thread })
    }
}

// ── WorkerHandle ─────────────────────────────────────────────────

/// Owner of a running worker thread.
pub struct WorkerHandle {
    queue: Arc<HandoffQueue<PendingItem>>,
    thread: JoinHandle<WorkerStats>,
}

impl WorkerHandle {
    /// Close the queue and wait for the worker to drain and exit.
    pub fn shutdown(self) -> Result<WorkerStats> {
        self.queue.shutdown();
        self.thread
            .join()
            .map_err(|_| RelayError::Other("relay worker panicked".into()))
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

// ── Tests ────────────────────────────────────────────────────────
