//! Capabilities the relay needs from the capture side.
//!
//! Camera acquisition and object detection live outside this crate. The
//! relay only needs completed frames with their detector output
//! ([`FrameSource`]) and the pixel geometry of the stream
//! ([`StreamInfoProvider`]).

use std::time::Duration;

use crate::detection::Detection;
use crate::error::Result;
use crate::relay::types::{Frame, StreamInfo};

/// A completed capture together with the detections computed for it.
#[derive(Debug)]
pub struct CompletedCapture {
    pub frame: Frame,
    pub detections: Vec<Detection>,
}

/// What a [`FrameSource`] produced while the caller waited.
#[derive(Debug)]
pub enum SourceEvent {
    /// A capture completed.
    Frame(CompletedCapture),
    /// No capture completed within the requested time.
    Timeout,
    /// The source has nothing more to deliver.
    Quit,
}

/// Yields completed frames.
pub trait FrameSource {
    /// Start (or restart) streaming.
    fn start(&mut self) -> Result<()>;

    /// Stop streaming. Idempotent.
    fn stop(&mut self);

    /// Block for up to `timeout` waiting for the next completed capture.
    fn next_frame(&mut self, timeout: Duration) -> Result<SourceEvent>;
}

/// Reports the geometry of the frames a stream produces.
pub trait StreamInfoProvider {
    fn stream_info(&self) -> StreamInfo;
}

impl StreamInfoProvider for StreamInfo {
    fn stream_info(&self) -> StreamInfo {
        *self
    }
}
