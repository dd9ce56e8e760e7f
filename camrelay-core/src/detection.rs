//! Detection header codec.
//!
//! Every relayed frame is preceded by one header datagram carrying the
//! detector output for that frame and the number of image fragments that
//! follow it.
//!
//! ## Wire format
//!
//! All fields little-endian.
//!
//! **Header packet** (8 + n × 44 bytes):
//! ```text
//! fragment_count:  i32  (4)
//! detection_count: i32  (4)
//! records:         [DetectionRecord; detection_count]
//! ```
//!
//! **Detection record** (44 bytes):
//! ```text
//! category:     i32       (4)
//! name_length:  i32       (4)
//! name:         [u8; 16]  (16, zero padded past name_length)
//! confidence:   f32       (4)
//! box.x:        f32       (4)
//! box.width:    f32       (4)
//! box.y:        f32       (4)
//! box.height:   f32       (4)
//! ```
//!
//! `fragment_count` is only known once the image has been compressed, so a
//! [`HeaderPacket`] cannot be transmitted directly: it has to be
//! [sealed](HeaderPacket::seal) with the count first.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{RelayError, Result};

// ── Constants ────────────────────────────────────────────────────

/// Fixed size of the name field in a detection record.
pub const MAX_NAME_LEN: usize = 16;

/// Size of the two leading count fields.
pub const HEADER_PREFIX_SIZE: usize = 8;

// ── Detection ────────────────────────────────────────────────────

/// Axis-aligned bounding box in detector coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single object-detector result attached to a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Detector class identifier.
    pub category: i32,
    /// Confidence in `0.0..=1.0`.
    pub confidence: f32,
    pub bbox: BoundingBox,
    /// Display name. Only the first [`MAX_NAME_LEN`] bytes go on the wire.
    pub name: String,
}

impl Detection {
    pub fn new(category: i32, name: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            category,
            confidence,
            bbox,
            name: name.into(),
        }
    }
}

// ── DetectionRecord ──────────────────────────────────────────────

/// Fixed-size wire form of a [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionRecord {
    pub category: i32,
    pub name_len: i32,
    pub name: [u8; MAX_NAME_LEN],
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl DetectionRecord {
    /// Encoded size on the wire.
    pub const SIZE: usize = 44;

    /// Build a record, truncating the name to at most [`MAX_NAME_LEN`]
    /// bytes on a character boundary.
    pub fn from_detection(detection: &Detection) -> Self {
        let bytes = detection.name.as_bytes();
        let mut len = bytes.len().min(MAX_NAME_LEN);
        while !detection.name.is_char_boundary(len) {
            len -= 1;
        }
        let mut name = [0u8; MAX_NAME_LEN];
        name[..len].copy_from_slice(&bytes[..len]);

        Self {
            category: detection.category,
            name_len: len as i32,
            name,
            confidence: detection.confidence,
            bbox: detection.bbox,
        }
    }

    /// Convert back into a [`Detection`].
    ///
    /// Names from foreign senders that are not valid UTF-8 decode with
    /// replacement characters.
    pub fn to_detection(&self) -> Detection {
        let len = (self.name_len.max(0) as usize).min(MAX_NAME_LEN);
        Detection {
            category: self.category,
            confidence: self.confidence,
            bbox: self.bbox,
            name: String::from_utf8_lossy(&self.name[..len]).into_owned(),
        }
    }

    /// Serialize into `buf` (little-endian).
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.category);
        buf.put_i32_le(self.name_len);
        buf.put_slice(&self.name);
        buf.put_f32_le(self.confidence);
        buf.put_f32_le(self.bbox.x);
        buf.put_f32_le(self.bbox.width);
        buf.put_f32_le(self.bbox.y);
        buf.put_f32_le(self.bbox.height);
    }

    /// Deserialize one record from the front of `buf`.
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(RelayError::InvalidHeader("truncated detection record"));
        }
        let category = buf.get_i32_le();
        let name_len = buf.get_i32_le();
        if !(0..=MAX_NAME_LEN as i32).contains(&name_len) {
            return Err(RelayError::InvalidHeader("name length out of range"));
        }
        let mut name = [0u8; MAX_NAME_LEN];
        buf.copy_to_slice(&mut name);
        let confidence = buf.get_f32_le();
        let x = buf.get_f32_le();
        let width = buf.get_f32_le();
        let y = buf.get_f32_le();
        let height = buf.get_f32_le();

        Ok(Self {
            category,
            name_len,
            name,
            confidence,
            bbox: BoundingBox {
                x,
                y,
                width,
                height,
            },
        })
    }
}

// ── HeaderPacket ─────────────────────────────────────────────────

/// Header for one frame, built when the capture completes.
///
/// The fragment count slot stays zeroed and private until
/// [`seal`](Self::seal) fills it in.
#[derive(Debug)]
pub struct HeaderPacket {
    buf: BytesMut,
    detection_count: usize,
}

impl HeaderPacket {
    /// Serialize `detections` into a header packet.
    pub fn serialize(detections: &[Detection]) -> Self {
        let mut buf = BytesMut::with_capacity(Self::encoded_len(detections.len()));
        buf.put_i32_le(0);
        buf.put_i32_le(detections.len() as i32);
        for detection in detections {
            DetectionRecord::from_detection(detection).encode(&mut buf);
        }
        Self {
            buf,
            detection_count: detections.len(),
        }
    }

    /// Length of a header carrying `detection_count` records.
    pub const fn encoded_len(detection_count: usize) -> usize {
        HEADER_PREFIX_SIZE + detection_count * DetectionRecord::SIZE
    }

    /// Number of detection records in this header.
    pub fn detection_count(&self) -> usize {
        self.detection_count
    }

    /// Total length on the wire.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write the fragment count and freeze the packet for transmission.
    pub fn seal(mut self, fragment_count: u32) -> SealedHeader {
        let count = i32::try_from(fragment_count).unwrap_or(i32::MAX);
        self.buf[0..4].copy_from_slice(&count.to_le_bytes());
        SealedHeader {
            bytes: self.buf.freeze(),
            fragment_count,
            detection_count: self.detection_count,
        }
    }
}

/// A header packet whose fragment count is known; ready to send.
#[derive(Debug, Clone)]
pub struct SealedHeader {
    bytes: Bytes,
    fragment_count: u32,
    detection_count: usize,
}

impl SealedHeader {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn fragment_count(&self) -> u32 {
        self.fragment_count
    }

    pub fn detection_count(&self) -> usize {
        self.detection_count
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ── DecodedHeader ────────────────────────────────────────────────

/// Receiver-side view of a header datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedHeader {
    pub fragment_count: u32,
    pub detections: Vec<Detection>,
}

impl DecodedHeader {
    /// Parse a complete header datagram.
    ///
    /// The datagram length must match its detection count exactly.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_PREFIX_SIZE {
            return Err(RelayError::HeaderLength {
                expected: HEADER_PREFIX_SIZE,
                actual: data.len(),
            });
        }
        let mut buf = data;
        let fragment_count = buf.get_i32_le();
        let detection_count = buf.get_i32_le();
        let fragment_count = u32::try_from(fragment_count)
            .map_err(|_| RelayError::InvalidHeader("negative fragment count"))?;
        let detection_count = usize::try_from(detection_count)
            .map_err(|_| RelayError::InvalidHeader("negative detection count"))?;

        let expected = HeaderPacket::encoded_len(detection_count);
        if data.len() != expected {
            return Err(RelayError::HeaderLength {
                expected,
                actual: data.len(),
            });
        }

        let mut detections = Vec::with_capacity(detection_count);
        for _ in 0..detection_count {
            detections.push(DetectionRecord::decode(&mut buf)?.to_detection());
        }

        Ok(Self {
            fragment_count,
            detections,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn person(x: f32) -> Detection {
        Detection::new(
            1,
            "person",
            0.87,
            BoundingBox {
                x,
                y: 20.0,
                width: 64.0,
                height: 128.0,
            },
        )
    }

    #[test]
    fn empty_list_is_prefix_only() {
        let header = HeaderPacket::serialize(&[]);
        assert_eq!(header.len(), HEADER_PREFIX_SIZE);
        assert_eq!(header.detection_count(), 0);

        let sealed = header.seal(0);
        let decoded = DecodedHeader::decode(sealed.as_bytes()).unwrap();
        assert_eq!(decoded.fragment_count, 0);
        assert!(decoded.detections.is_empty());
    }

    #[test]
    fn three_detections_layout() {
        let detections = vec![person(1.0), person(2.0), person(3.0)];
        let header = HeaderPacket::serialize(&detections);
        assert_eq!(header.len(), 8 + 3 * DetectionRecord::SIZE);

        let sealed = header.seal(7);
        let bytes = sealed.as_bytes();
        assert_eq!(i32::from_le_bytes(bytes[0..4].try_into().unwrap()), 7);
        assert_eq!(i32::from_le_bytes(bytes[4..8].try_into().unwrap()), 3);
    }

    #[test]
    fn record_field_order() {
        let header = HeaderPacket::serialize(&[person(5.0)]).seal(1);
        let rec = &header.as_bytes()[8..];
        assert_eq!(i32::from_le_bytes(rec[0..4].try_into().unwrap()), 1);
        assert_eq!(i32::from_le_bytes(rec[4..8].try_into().unwrap()), 6);
        assert_eq!(&rec[8..14], b"person");
        assert!(rec[14..24].iter().all(|&b| b == 0));
        assert_eq!(f32::from_le_bytes(rec[24..28].try_into().unwrap()), 0.87);
        assert_eq!(f32::from_le_bytes(rec[28..32].try_into().unwrap()), 5.0);
        assert_eq!(f32::from_le_bytes(rec[32..36].try_into().unwrap()), 64.0);
        assert_eq!(f32::from_le_bytes(rec[36..40].try_into().unwrap()), 20.0);
        assert_eq!(f32::from_le_bytes(rec[40..44].try_into().unwrap()), 128.0);
    }

    #[test]
    fn round_trip_preserves_values() {
        let detections: Vec<Detection> = (0..5)
            .map(|i| {
                Detection::new(
                    i,
                    format!("class-{i}"),
                    i as f32 / 10.0,
                    BoundingBox {
                        x: i as f32,
                        y: 2.0 * i as f32,
                        width: 10.0,
                        height: 0.5,
                    },
                )
            })
            .collect();

        let sealed = HeaderPacket::serialize(&detections).seal(12);
        let decoded = DecodedHeader::decode(sealed.as_bytes()).unwrap();
        assert_eq!(decoded.fragment_count, 12);
        assert_eq!(decoded.detections, detections);
    }

    #[test]
    fn long_names_are_truncated() {
        let long = Detection::new(3, "a-very-long-category-name", 0.5, BoundingBox::default());
        let sealed = HeaderPacket::serialize(&[long]).seal(0);
        assert_eq!(sealed.len(), 8 + DetectionRecord::SIZE);

        let decoded = DecodedHeader::decode(sealed.as_bytes()).unwrap();
        assert_eq!(decoded.detections[0].name, "a-very-long-cate");
        assert_eq!(decoded.detections[0].name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn truncation_keeps_whole_characters() {
        // 1 + 8 * 2 bytes: the 16-byte cut falls inside the last 'é'.
        let det = Detection::new(4, "aéééééééé", 0.5, BoundingBox::default());
        let record = DetectionRecord::from_detection(&det);
        assert_eq!(record.name_len, 15);

        let sealed = HeaderPacket::serialize(&[det]).seal(0);
        let decoded = DecodedHeader::decode(sealed.as_bytes()).unwrap();
        assert_eq!(
            decoded.detections[0],
            Detection::new(4, "aééééééé", 0.5, BoundingBox::default())
        );
    }

    #[test]
    fn decode_rejects_short_and_mismatched() {
        assert!(matches!(
            DecodedHeader::decode(&[0u8; 4]),
            Err(RelayError::HeaderLength { .. })
        ));

        let sealed = HeaderPacket::serialize(&[person(0.0)]).seal(1);
        let truncated = &sealed.as_bytes()[..sealed.len() - 1];
        assert!(matches!(
            DecodedHeader::decode(truncated),
            Err(RelayError::HeaderLength { .. })
        ));
    }

    #[test]
    fn decode_rejects_negative_counts() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i32.to_le_bytes());
        raw.extend_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(
            DecodedHeader::decode(&raw),
            Err(RelayError::InvalidHeader(_))
        ));
    }
}
