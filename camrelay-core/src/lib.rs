//! # camrelay-core
//!
//! Core library for relaying camera frames and their object detections to
//! a remote viewer.
//!
//! This crate contains:
//! - **Detection header**: `HeaderPacket` / `DecodedHeader`: the
//!   little-endian per-frame header carrying fragment count and detections
//! - **Handoff**: `HandoffQueue`: single-slot, latest-wins channel between
//!   the capture thread and the worker
//! - **Relay**: `FrameIngest`, `FrameEncoder`, `FrameTransport`,
//!   `RelayWorker` and the viewer-side `FrameReceiver`
//! - **Control**: `CommandServer`: TCP `startvideo` / `stopvideo` / `status`
//! - **Source**: `FrameSource` / `StreamInfoProvider` capability traits
//! - **Error**: `RelayError`: typed, `thiserror`-based error enum

pub mod control;
pub mod detection;
pub mod error;
pub mod handoff;
pub mod relay;
pub mod source;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use control::{CommandServer, ControlCommand, DEFAULT_COMMAND_PORT, spawn_command_server};
pub use detection::{
    BoundingBox, DecodedHeader, Detection, DetectionRecord, HEADER_PREFIX_SIZE, HeaderPacket,
    MAX_NAME_LEN, SealedHeader,
};
pub use error::{RelayError, Result};
pub use handoff::{Handoff, HandoffQueue};
pub use relay::{
    DatagramSink, FRAGMENT_SIZE, Frame, FrameBuffer, FrameEncoder, FrameIngest, FrameReceiver,
    FrameTransport, ImageCodec, PendingItem, PixelFormat, RelayContext, RelayWorker,
    StreamInfo, StreamingFlag, UdpSink, WorkerHandle, WorkerStats, fragment_count,
};
pub use source::{CompletedCapture, FrameSource, SourceEvent, StreamInfoProvider};
