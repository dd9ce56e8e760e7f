//! Error types for the frame relay.
//!
//! Fallible operations return [`Result<T>`]. Which errors are fatal and
//! which merely skip a frame is decided by the caller: the ingest path
//! propagates, the worker logs and moves on to the next item.

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RelayError>;

/// The canonical error type for the frame relay.
#[derive(Debug, Error)]
pub enum RelayError {
    // ── Frame Errors ─────────────────────────────────────────────
    /// A completed capture arrived without backing memory.
    #[error("no buffer to encode")]
    InvalidBuffer,

    /// The pixel buffer is shorter than its geometry requires.
    #[error("frame buffer too small: expected {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    /// The stream geometry cannot be represented (e.g. stride < row bytes).
    #[error("invalid stream geometry: {0}")]
    InvalidGeometry(String),

    /// Pixel format the converter does not understand.
    #[error("unsupported pixel format: {0}")]
    UnsupportedFormat(String),

    /// Compressing the converted frame failed.
    #[error("image encode failed: {0}")]
    Encode(String),

    // ── Wire Errors ──────────────────────────────────────────────
    /// A header packet field could not be parsed.
    #[error("invalid header packet: {0}")]
    InvalidHeader(&'static str),

    /// The header packet length disagrees with its detection count.
    #[error("invalid header length: expected {expected}, got {actual}")]
    HeaderLength { expected: usize, actual: usize },

    // ── Network Errors ───────────────────────────────────────────
    /// A socket operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Application Errors ───────────────────────────────────────
    /// Configuration value rejected at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for RelayError {
    fn from(s: String) -> Self {
        RelayError::Other(s)
    }
}

impl From<&str> for RelayError {
    fn from(s: &str) -> Self {
        RelayError::Other(s.to_string())
    }
}

impl From<image::ImageError> for RelayError {
    fn from(e: image::ImageError) -> Self {
        RelayError::Encode(e.to_string())
    }
}
