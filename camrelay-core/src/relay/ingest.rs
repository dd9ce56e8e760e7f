//! Capture-side entry point of the relay.
//!
//! Runs on the capture thread. Each completed capture is turned into a
//! [`PendingItem`] and published to the handoff queue; the only blocking
//! is the queue mutex.

use std::sync::Arc;

use tracing::debug;

use crate::detection::{Detection, HeaderPacket};
use crate::error::{RelayError, Result};
use crate::handoff::HandoffQueue;
use crate::relay::context::RelayContext;
use crate::relay::types::{Frame, PendingItem};
use crate::source::StreamInfoProvider;

/// Builds detection headers and publishes frames for the worker.
pub struct FrameIngest<P> {
    queue: Arc<HandoffQueue<PendingItem>>,
    info: P,
    stream_start_us: Option<i64>,
    header_seq: u64,
}

impl<P: StreamInfoProvider> FrameIngest<P> {
    pub fn new(context: &RelayContext, info: P) -> Self {
        Self {
            queue: Arc::clone(&context.queue),
            info,
            stream_start_us: None,
            header_seq: 0,
        }
    }

    /// Publish one completed capture.
    ///
    /// Fails with [`RelayError::InvalidBuffer`] when the frame has no
    /// backing memory; the frame is released either way.
    pub fn on_frame_ready(&mut self, frame: Frame, detections: &[Detection]) -> Result<()> {
        if frame.buffer.is_empty() {
            return Err(RelayError::InvalidBuffer);
        }

        let header = HeaderPacket::serialize(detections);
        let start = *self.stream_start_us.get_or_insert(frame.timestamp_us);
        self.header_seq += 1;

        debug!(
            objects = detections.len(),
            header_len = header.len(),
            header_seq = self.header_seq,
            "frame ready"
        );

        self.queue.publish(PendingItem {
            buffer: frame.buffer,
            info: self.info.stream_info(),
            pts_us: frame.timestamp_us - start,
            sequence: self.header_seq,
            header,
        });
        Ok(())
    }

    /// Forget the stream start so the next frame restarts presentation
    /// time at zero.
    pub fn reset_stream_start(&mut self) {
        self.stream_start_us = None;
    }

    /// Headers built since construction.
    pub fn header_count(&self) -> u64 {
        self.header_seq
    }
}

// ── Tests ────────────────────────────────────────────────────────
