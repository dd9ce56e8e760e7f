//! Viewer-side reassembly of relayed frames.
//!
//! Fragments are unframed, so the receiver has to know whether the sender
//! is currently streaming images (the viewer controls that through the
//! command port). Lost fragments are not recovered: the frame is reported
//! as lost and the next header starts over.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::detection::DecodedHeader;
use crate::error::{RelayError, Result};

/// Largest payload a UDP datagram can carry.
const MAX_DATAGRAM: usize = 65_507;

/// One reassembled frame.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub header: DecodedHeader,
    /// Compressed image bytes; empty when images were not expected.
    pub image: Vec<u8>,
}

/// Receives header + fragment sequences from a relay.
pub struct FrameReceiver {
    socket: UdpSocket,
    timeout: Duration,
    buf: Vec<u8>,
}

impl FrameReceiver {
    pub fn bind(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        Self::new(UdpSocket::bind(addr)?, timeout)
    }

    /// Wrap a bound socket; every receive waits at most `timeout`.
    pub fn new(socket: UdpSocket, timeout: Duration) -> Result<Self> {
        socket.set_read_timeout(Some(timeout))?;
        Ok(Self {
            socket,
            timeout,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive the next frame.
    ///
    /// Datagrams that do not parse as a header are skipped while waiting
    /// for one. With `expect_image`, exactly `fragment_count` further
    /// datagrams are collected.
    pub fn receive_frame(&mut self, expect_image: bool) -> Result<ReceivedFrame> {
        let header = loop {
            let len = self.recv()?;
            if let Ok(h) = DecodedHeader::decode(&self.buf[..len]) {
                break h;
            }
        };

        let mut image = Vec::new();
        if expect_image {
            for _ in 0..header.fragment_count {
                let len = self.recv()?;
                image.extend_from_slice(&self.buf[..len]);
            }
        }

        Ok(ReceivedFrame { header, image })
    }

    fn recv(&mut self) -> Result<usize> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, _)) => Ok(len),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(RelayError::Timeout(self.timeout))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BoundingBox, Detection, HeaderPacket};

    fn pair() -> (UdpSocket, FrameReceiver) {
        let rx = FrameReceiver::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(300))
            .unwrap();
        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();
        tx.connect(rx.local_addr().unwrap()).unwrap();
        (tx, rx)
    }

    #[test]
    fn reassembles_fragments() {
        let (tx, mut rx) = pair();
        let dets = vec![Detection::new(4, "dog", 0.9, BoundingBox::default())];
        tx.send(HeaderPacket::serialize(&dets).seal(2).as_bytes()).unwrap();
        tx.send(&[1u8; 10]).unwrap();
        tx.send(&[2u8; 5]).unwrap();

        let frame = rx.receive_frame(true).unwrap();
        assert_eq!(frame.header.detections, dets);
        assert_eq!(frame.image.len(), 15);
        assert_eq!(&frame.image[9..11], &[1, 2]);
    }

    #[test]
    fn header_only_when_images_not_expected() {
        let (tx, mut rx) = pair();
        tx.send(HeaderPacket::serialize(&[]).seal(3).as_bytes()).unwrap();
        let frame = rx.receive_frame(false).unwrap();
        assert_eq!(frame.header.fragment_count, 3);
        assert!(frame.image.is_empty());
    }

    #[test]
    fn missing_fragment_is_frame_loss() {
        let (tx, mut rx) = pair();
        tx.send(HeaderPacket::serialize(&[]).seal(2).as_bytes()).unwrap();
        tx.send(&[0u8; 4]).unwrap();
        assert!(matches!(rx.receive_frame(true), Err(RelayError::Timeout(_))));
    }

    #[test]
    fn skips_stray_datagrams_before_header() {
        let (tx, mut rx) = pair();
        tx.send(&[0xFF; 3]).unwrap();
        tx.send(HeaderPacket::serialize(&[]).seal(0).as_bytes()).unwrap();
        let frame = rx.receive_frame(true).unwrap();
        assert_eq!(frame.header.fragment_count, 0);
    }
}
