//! UDP transport for relayed frames.
//!
//! Each frame goes out as one header datagram followed by the compressed
//! image split into fragments of at most [`FRAGMENT_SIZE`] bytes:
//!
//! ```text
//! datagram 0:      header packet (see crate::detection)
//! datagram 1..=n:  image bytes [i*F .. min((i+1)*F, len)]   (streaming only)
//! ```
//!
//! Fragments carry no framing of their own. A receiver counts them using
//! the header's `fragment_count`; any loss means the frame is lost.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use crate::detection::SealedHeader;
use crate::error::{RelayError, Result};

// ── Constants ────────────────────────────────────────────────────

/// Maximum image bytes per fragment datagram.
pub const FRAGMENT_SIZE: usize = 4096;

/// Number of fragments needed for `payload_len` bytes.
///
/// An empty payload needs no fragments.
pub fn fragment_count(payload_len: usize, fragment_size: usize) -> u32 {
    if fragment_size == 0 {
        return 0;
    }
    payload_len.div_ceil(fragment_size) as u32
}

// ── DatagramSink ─────────────────────────────────────────────────

/// Destination for outgoing datagrams.
pub trait DatagramSink {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<()>;
}

/// Unconnected UDP socket sending to a fixed destination.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl UdpSink {
    /// Bind an ephemeral local port of the destination's address family.
    pub fn bind(destination: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        Ok(Self::new(UdpSocket::bind(local)?, destination))
    }

    /// Wrap an already-bound socket.
    pub fn new(socket: UdpSocket, destination: SocketAddr) -> Self {
        Self {
            socket,
            destination,
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl DatagramSink for UdpSink {
    fn send_datagram(&mut self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send_to(datagram, self.destination).map(|_| ())
    }
}

// ── FrameTransport ───────────────────────────────────────────────

/// What one call to [`FrameTransport::send_frame`] put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub datagrams: u32,
    pub bytes: usize,
}

/// Sends header + fragments through a [`DatagramSink`].
pub struct FrameTransport<S> {
    sink: S,
    fragment_size: usize,
    datagrams_sent: u64,
    bytes_sent: u64,
}

impl<S: DatagramSink> FrameTransport<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            fragment_size: FRAGMENT_SIZE,
            datagrams_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Override the fragment size (must be non-zero).
    pub fn with_fragment_size(mut self, fragment_size: usize) -> Result<Self> {
        if fragment_size == 0 {
            return Err(RelayError::Config("fragment size must be non-zero".into()));
        }
        self.fragment_size = fragment_size;
        Ok(self)
    }

    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    /// Send the header, then the payload fragments if `send_image` is set.
    ///
    /// The header must have been sealed with
    /// [`fragment_count`]`(payload.len(), self.fragment_size())`.
    pub fn send_frame(
        &mut self,
        header: &SealedHeader,
        payload: &[u8],
        send_image: bool,
    ) -> Result<SendReport> {
        debug_assert_eq!(
            header.fragment_count(),
            fragment_count(payload.len(), self.fragment_size)
        );

        let mut report = SendReport {
            datagrams: 0,
            bytes: 0,
        };

        self.sink.send_datagram(header.as_bytes())?;
        self.record(&mut report, header.len());

        if send_image {
            for (idx, fragment) in payload.chunks(self.fragment_size).enumerate() {
                self.sink.send_datagram(fragment).map_err(|e| {
                    RelayError::Other(format!("UDP send fragment {idx}: {e}"))
                })?;
                self.record(&mut report, fragment.len());
            }
        }

        Ok(report)
    }

    fn record(&mut self, report: &mut SendReport, len: usize) {
        report.datagrams += 1;
        report.bytes += len;
        self.datagrams_sent += 1;
        self.bytes_sent += len as u64;
    }

    /// Total datagrams sent since construction.
    pub fn datagrams_sent(&self) -> u64 {
        self.datagrams_sent
    }

    /// Total bytes sent since construction.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

// ── Tests ────────────────────────────────────────────────────────
