//! Frame types shared between the capture side and the worker.
//!
//! A [`FrameBuffer`] is on loan from the capture framework. Whoever holds
//! it last (the worker after processing, the queue when the item is
//! superseded) drops it, and dropping runs the framework's release
//! callback exactly once.

use std::fmt;

use bytes::Bytes;

use crate::detection::HeaderPacket;
use crate::error::{RelayError, Result};

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Planar Y, U, V (I420). Chroma planes are half width and half
    /// height with a row stride of `stride / 2`.
    Yuv420,
    /// Y plane followed by interleaved UV at half resolution, same stride.
    Nv12,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb888,
    /// 3 bytes per pixel: Blue, Green, Red.
    Bgr888,
    /// 4 bytes per pixel stored Blue, Green, Red, unused.
    Xrgb8888,
}

impl PixelFormat {
    /// Bytes per pixel of the first (or only) plane.
    pub const fn luma_bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Yuv420 | PixelFormat::Nv12 => 1,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => 3,
            PixelFormat::Xrgb8888 => 4,
        }
    }

    /// Minimum buffer size for a `height`-row frame with `stride`-byte rows.
    pub const fn frame_size(self, stride: usize, height: usize) -> usize {
        let chroma_rows = height.div_ceil(2);
        match self {
            PixelFormat::Yuv420 => stride * height + 2 * (stride / 2) * chroma_rows,
            PixelFormat::Nv12 => stride * height + stride * chroma_rows,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 | PixelFormat::Xrgb8888 => stride * height,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Yuv420 => write!(f, "yuv420"),
            PixelFormat::Nv12 => write!(f, "nv12"),
            PixelFormat::Rgb888 => write!(f, "rgb888"),
            PixelFormat::Bgr888 => write!(f, "bgr888"),
            PixelFormat::Xrgb8888 => write!(f, "xrgb8888"),
        }
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yuv420" | "i420" => Ok(PixelFormat::Yuv420),
            "nv12" => Ok(PixelFormat::Nv12),
            "rgb888" | "rgb24" => Ok(PixelFormat::Rgb888),
            "bgr888" | "bgr24" => Ok(PixelFormat::Bgr888),
            "xrgb8888" => Ok(PixelFormat::Xrgb8888),
            other => Err(RelayError::UnsupportedFormat(other.to_string())),
        }
    }
}

// ── StreamInfo ───────────────────────────────────────────────────

/// Pixel geometry of a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Row pitch of the first plane in bytes.
    pub stride: u32,
    pub pixel_format: PixelFormat,
}

impl StreamInfo {
    /// Geometry with tightly packed rows.
    ///
    /// Planar YUV strides are rounded up to even so the half-resolution
    /// chroma rows of an odd-width frame still hold every sample.
    pub fn packed(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let stride = match pixel_format {
            PixelFormat::Yuv420 | PixelFormat::Nv12 => width.next_multiple_of(2),
            _ => width * pixel_format.luma_bytes_per_pixel() as u32,
        };
        Self {
            width,
            height,
            stride,
            pixel_format,
        }
    }

    /// Bytes a frame with this geometry occupies.
    pub fn frame_size(&self) -> usize {
        self.pixel_format
            .frame_size(self.stride as usize, self.height as usize)
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Pixel memory on loan from the capture framework.
pub struct FrameBuffer {
    data: Bytes,
    release: Option<ReleaseFn>,
}

impl FrameBuffer {
    /// A buffer with no release obligation.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            release: None,
        }
    }

    /// A buffer that calls `release` once when dropped.
    pub fn with_release(data: impl Into<Bytes>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            data: data.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.data.len())
            .field("release", &self.release.is_some())
            .finish()
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// One completed capture as handed to the relay.
#[derive(Debug)]
pub struct Frame {
    pub buffer: FrameBuffer,
    /// Monotonic sensor timestamp in microseconds.
    pub timestamp_us: i64,
}

// ── PendingItem ──────────────────────────────────────────────────

/// The unit moved through the handoff queue.
#[derive(Debug)]
pub struct PendingItem {
    pub buffer: FrameBuffer,
    pub info: StreamInfo,
    /// Presentation time relative to the first frame of the stream.
    pub pts_us: i64,
    /// Per-stream header sequence number, for log correlation.
    pub sequence: u64,
    pub header: HeaderPacket,
}
