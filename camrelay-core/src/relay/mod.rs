//! # Frame relay pipeline
//!
//! ```text
//! CAPTURE THREAD                 WORKER THREAD                    NETWORK
//! ┌────────────────────┐        ┌──────────────────────────┐
//! │ FrameSource        │        │ HandoffQueue::take_or_wait│
//! │   ↓                │        │   ↓                       │
//! │ FrameIngest        │ slot   │ FrameEncoder (→ 640×480)  │
//! │   HeaderPacket     │ ─────► │   ↓                       │   UDP
//! │   HandoffQueue::   │        │ seal(fragment_count)      │ ──────► viewer
//! │     publish        │        │   ↓                       │
//! └────────────────────┘        │ FrameTransport::send_frame│
//!                               └──────────────────────────┘
//!                                        ▲ StreamingFlag
//!                               CommandServer (TCP 5556)
//! ```
//!
//! ## Sub-modules
//!
//! | Module      | Purpose                                              |
//! |-------------|------------------------------------------------------|
//! | `types`     | Pixel formats, stream geometry, loaned frame buffers |
//! | `context`   | Shared queue, streaming flag and destination         |
//! | `ingest`    | Capture-side publisher                               |
//! | `encoder`   | Pixel conversion, downscale, JPEG/PNG compression    |
//! | `transport` | Header + fragment datagrams over UDP                 |
//! | `worker`    | Background encode/transmit loop                      |
//! | `receiver`  | Viewer-side reassembly                               |

pub mod context;
pub mod encoder;
pub mod ingest;
pub mod receiver;
pub mod transport;
pub mod types;
pub mod worker;

pub use context::{RelayContext, StreamingFlag};
pub use encoder::{EncodedImage, FrameEncoder, ImageCodec};
pub use ingest::FrameIngest;
pub use receiver::{FrameReceiver, ReceivedFrame};
pub use transport::{
    DatagramSink, FRAGMENT_SIZE, FrameTransport, SendReport, UdpSink, fragment_count,
};
pub use types::{Frame, FrameBuffer, PendingItem, PixelFormat, StreamInfo};
pub use worker::{FrameOutcome, RelayWorker, WAIT_TIMEOUT, WorkerHandle, WorkerStats};
