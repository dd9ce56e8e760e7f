//! Preview encoder: pixel conversion, downscale and image compression.
//!
//! Every frame is scaled to one fixed output size and compressed at one
//! fixed quality regardless of the capture resolution, which bounds the
//! per-frame encode time and datagram count.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use crate::error::{RelayError, Result};
use crate::relay::types::{PixelFormat, StreamInfo};

// ── Constants ────────────────────────────────────────────────────

pub const OUTPUT_WIDTH: u32 = 640;
pub const OUTPUT_HEIGHT: u32 = 480;
pub const DEFAULT_QUALITY: u8 = 80;

// ── ImageCodec ───────────────────────────────────────────────────

/// Compression applied to the scaled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCodec {
    /// Baseline JPEG, quality 1..=100.
    Jpeg { quality: u8 },
    /// Lossless PNG.
    Png,
}

impl ImageCodec {
    /// Resolve a codec by name (`"jpeg"`/`"jpg"` or `"png"`).
    pub fn from_name(name: &str, quality: u8) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageCodec::Jpeg {
                quality: quality.clamp(1, 100),
            }),
            "png" => Ok(ImageCodec::Png),
            other => Err(RelayError::Config(format!("unknown image codec {other:?}"))),
        }
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        ImageCodec::Jpeg {
            quality: DEFAULT_QUALITY,
        }
    }
}

// ── EncodedImage ─────────────────────────────────────────────────

/// A compressed preview frame.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

// ── FrameEncoder ─────────────────────────────────────────────────

/// Converts captured frames into compressed previews.
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    output_width: u32,
    output_height: u32,
    codec: ImageCodec,
}

impl FrameEncoder {
    pub fn new(output_width: u32, output_height: u32, codec: ImageCodec) -> Result<Self> {
        if output_width == 0 || output_height == 0 {
            return Err(RelayError::Config(format!(
                "output size {output_width}x{output_height} must be non-zero"
            )));
        }
        Ok(Self {
            output_width,
            output_height,
            codec,
        })
    }

    pub fn codec(&self) -> ImageCodec {
        self.codec
    }

    /// Convert, scale and compress one frame.
    ///
    /// Returns `Ok(None)` for a frame with no pixels.
    pub fn encode(&self, data: &[u8], info: &StreamInfo) -> Result<Option<EncodedImage>> {
        let Some(rgb) = to_rgb(data, info)? else {
            return Ok(None);
        };

        let scaled = if rgb.dimensions() == (self.output_width, self.output_height) {
            rgb
        } else {
            imageops::resize(
                &rgb,
                self.output_width,
                self.output_height,
                FilterType::Triangle,
            )
        };

        let mut out = Vec::new();
        match self.codec {
            ImageCodec::Jpeg { quality } => {
                JpegEncoder::new_with_quality(&mut out, quality).encode_image(&scaled)?;
            }
            ImageCodec::Png => {
                PngEncoder::new(&mut out).write_image(
                    scaled.as_raw(),
                    scaled.width(),
                    scaled.height(),
                    ExtendedColorType::Rgb8,
                )?;
            }
        }

        Ok(Some(EncodedImage {
            width: scaled.width(),
            height: scaled.height(),
            data: out,
        }))
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self {
            output_width: OUTPUT_WIDTH,
            output_height: OUTPUT_HEIGHT,
            codec: ImageCodec::default(),
        }
    }
}

// ── Pixel conversion ─────────────────────────────────────────────

/// Convert a captured frame into packed RGB.
///
/// Returns `Ok(None)` when the frame has zero width or height.
pub fn to_rgb(data: &[u8], info: &StreamInfo) -> Result<Option<RgbImage>> {
    let width = info.width as usize;
    let height = info.height as usize;
    if width == 0 || height == 0 {
        return Ok(None);
    }

    let stride = info.stride as usize;
    let bpp = info.pixel_format.luma_bytes_per_pixel();
    if stride < width * bpp {
        return Err(RelayError::InvalidGeometry(format!(
            "stride {stride} < {width} px × {bpp} B"
        )));
    }
    if info.pixel_format == PixelFormat::Yuv420 && stride / 2 < width.div_ceil(2) {
        return Err(RelayError::InvalidGeometry(format!(
            "chroma stride {} < {}",
            stride / 2,
            width.div_ceil(2)
        )));
    }
    if info.pixel_format == PixelFormat::Nv12 && stride < 2 * width.div_ceil(2) {
        return Err(RelayError::InvalidGeometry(format!(
            "interleaved chroma stride {stride} < {} B",
            2 * width.div_ceil(2)
        )));
    }

    let expected = info.frame_size();
    if data.len() < expected {
        return Err(RelayError::BufferTooSmall {
            expected,
            actual: data.len(),
        });
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    match info.pixel_format {
        PixelFormat::Yuv420 => {
            let chroma_stride = stride / 2;
            let u_plane = stride * height;
            let v_plane = u_plane + chroma_stride * height.div_ceil(2);
            for y in 0..height {
                let luma = &data[y * stride..];
                let u_row = &data[u_plane + (y / 2) * chroma_stride..];
                let v_row = &data[v_plane + (y / 2) * chroma_stride..];
                for x in 0..width {
                    rgb.extend_from_slice(&yuv_to_rgb(luma[x], u_row[x / 2], v_row[x / 2]));
                }
            }
        }
        PixelFormat::Nv12 => {
            let uv_plane = stride * height;
            for y in 0..height {
                let luma = &data[y * stride..];
                let uv_row = &data[uv_plane + (y / 2) * stride..];
                for x in 0..width {
                    let c = (x / 2) * 2;
                    rgb.extend_from_slice(&yuv_to_rgb(luma[x], uv_row[c], uv_row[c + 1]));
                }
            }
        }
        PixelFormat::Rgb888 => {
            for y in 0..height {
                let row = y * stride;
                rgb.extend_from_slice(&data[row..row + width * 3]);
            }
        }
        PixelFormat::Bgr888 => {
            for y in 0..height {
                let row = &data[y * stride..y * stride + width * 3];
                for px in row.chunks_exact(3) {
                    rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
        }
        PixelFormat::Xrgb8888 => {
            for y in 0..height {
                let row = &data[y * stride..y * stride + width * 4];
                for px in row.chunks_exact(4) {
                    rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
        }
    }

    RgbImage::from_raw(info.width, info.height, rgb)
        .map(Some)
        .ok_or_else(|| RelayError::Other("rgb buffer size mismatch".into()))
}

/// BT.601 limited-range YUV to RGB.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as i32 - 16).max(0) * 298;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}

// ── Tests ────────────────────────────────────────────────────────
