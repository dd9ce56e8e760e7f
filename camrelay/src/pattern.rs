//! Synthetic capture source.
//!
//! Produces a moving gradient with a bright square sliding across it, paced
//! at the configured framerate, plus one detection boxing the square. Lets
//! the relay run end to end without camera hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use camrelay_core::{
    BoundingBox, CompletedCapture, Detection, Frame, FrameBuffer, FrameSource, PixelFormat,
    RelayError, Result, SourceEvent, StreamInfo, StreamInfoProvider,
};

const TARGET_CATEGORY: i32 = 0;
const TARGET_NAME: &str = "test-target";
const TARGET_LUMA: u8 = 235;

pub struct TestPatternSource {
    info: StreamInfo,
    period: Duration,
    origin: Instant,
    next_due: Option<Instant>,
    index: u64,
    outstanding: Arc<AtomicUsize>,
}

impl TestPatternSource {
    pub fn new(info: StreamInfo, framerate: u32) -> Result<Self> {
        if info.width == 0 || info.height == 0 {
            return Err(RelayError::InvalidGeometry(format!(
                "test pattern needs a non-empty frame, got {}x{}",
                info.width, info.height
            )));
        }
        Ok(Self {
            info,
            period: Duration::from_secs(1) / framerate.max(1),
            origin: Instant::now(),
            next_due: None,
            index: 0,
            outstanding: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Frames produced so far.
    pub fn frames_produced(&self) -> u64 {
        self.index
    }

    /// Buffers handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn capture(&mut self) -> CompletedCapture {
        let (data, bbox) = render(&self.info, self.index);
        self.index += 1;

        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let outstanding = Arc::clone(&self.outstanding);
        let buffer = FrameBuffer::with_release(data, move || {
            outstanding.fetch_sub(1, Ordering::SeqCst);
        });

        CompletedCapture {
            frame: Frame {
                buffer,
                timestamp_us: self.origin.elapsed().as_micros() as i64,
            },
            detections: vec![Detection::new(TARGET_CATEGORY, TARGET_NAME, 0.99, bbox)],
        }
    }
}

impl FrameSource for TestPatternSource {
    fn start(&mut self) -> Result<()> {
        self.next_due = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        self.next_due = None;
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<SourceEvent> {
        let Some(due) = self.next_due else {
            return Err(RelayError::Other("test pattern source is not started".into()));
        };

        let wait = due.saturating_duration_since(Instant::now());
        if wait > timeout {
            thread::sleep(timeout);
            return Ok(SourceEvent::Timeout);
        }
        thread::sleep(wait);
        self.next_due = Some(due + self.period);

        Ok(SourceEvent::Frame(self.capture()))
    }
}

impl StreamInfoProvider for TestPatternSource {
    fn stream_info(&self) -> StreamInfo {
        self.info
    }
}

// ── Rendering ────────────────────────────────────────────────────

/// Draw frame `index` and return it with the target's box in pixels.
pub fn render(info: &StreamInfo, index: u64) -> (Vec<u8>, BoundingBox) {
    let width = info.width as usize;
    let height = info.height as usize;
    let stride = info.stride as usize;
    let bpp = info.pixel_format.luma_bytes_per_pixel();

    let box_w = (width / 8).max(1);
    let box_h = (height / 8).max(1);
    let travel = width - box_w;
    let box_x = if travel == 0 {
        0
    } else {
        (index as usize * 4) % travel
    };
    let box_y = (height - box_h) / 2;

    let mut data = vec![0u8; info.frame_size()];
    let shift = (index as usize).wrapping_mul(2);
    for row in 0..height {
        for col in 0..width {
            let inside =
                (box_x..box_x + box_w).contains(&col) && (box_y..box_y + box_h).contains(&row);
            let value = if inside {
                TARGET_LUMA
            } else {
                16 + ((col + row + shift) % 200) as u8
            };
            let px = &mut data[row * stride + col * bpp..][..bpp];
            px[..bpp.min(3)].fill(value);
        }
    }

    if matches!(info.pixel_format, PixelFormat::Yuv420 | PixelFormat::Nv12) {
        data[stride * height..].fill(128);
    }

    let bbox = BoundingBox {
        x: box_x as f32,
        y: box_y as f32,
        width: box_w as f32,
        height: box_h as f32,
    };
    (data, bbox)
}

// ── Tests ────────────────────────────────────────────────────────
