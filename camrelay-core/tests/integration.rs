//! Integration tests: capture ingest through the worker to a viewer over
//! real localhost UDP, with streaming toggled over the TCP control port.

use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use camrelay_core::{
    BoundingBox, CommandServer, Detection, Frame, FrameBuffer, FrameEncoder, FrameIngest,
    FrameReceiver, FrameTransport, PixelFormat, RelayContext, RelayError, RelayWorker,
    StreamInfo, StreamingFlag, UdpSink,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// ── Helpers ──────────────────────────────────────────────────────

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

fn stream_info() -> StreamInfo {
    StreamInfo::packed(WIDTH, HEIGHT, PixelFormat::Yuv420)
}

/// Receiver on an ephemeral port plus a context pointing at it.
fn viewer(streaming: bool) -> (FrameReceiver, RelayContext) {
    let receiver =
        FrameReceiver::bind("127.0.0.1:0".parse().unwrap(), Duration::from_secs(2)).unwrap();
    let ctx = RelayContext::new(receiver.local_addr().unwrap(), StreamingFlag::new(streaming));
    (receiver, ctx)
}

fn start_worker(ctx: &RelayContext) -> camrelay_core::WorkerHandle {
    let sink = UdpSink::bind(ctx.destination).unwrap();
    RelayWorker::new(ctx, FrameEncoder::default(), FrameTransport::new(sink))
        .with_wait_timeout(Duration::from_millis(50))
        .spawn()
        .unwrap()
}

fn frame(ts: i64, released: &Arc<AtomicUsize>) -> Frame {
    let info = stream_info();
    let mut data = vec![128u8; info.frame_size()];
    for (i, px) in data[..(WIDTH * HEIGHT) as usize].iter_mut().enumerate() {
        *px = 16 + (i % WIDTH as usize) as u8 / 2;
    }
    let counter = Arc::clone(released);
    Frame {
        buffer: FrameBuffer::with_release(data, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        timestamp_us: ts,
    }
}

fn detections(category: i32) -> Vec<Detection> {
    vec![
        Detection::new(
            category,
            "person",
            0.87,
            BoundingBox {
                x: 0.1,
                y: 0.2,
                width: 0.3,
                height: 0.4,
            },
        ),
        Detection::new(17, "a-very-long-class-name", 0.51, BoundingBox::default()),
    ]
}

// ── Streaming ────────────────────────────────────────────────────

#[test]
fn test_frame_reaches_viewer() {
    let (mut receiver, ctx) = viewer(true);
    let handle = start_worker(&ctx);
    let released = Arc::new(AtomicUsize::new(0));

    let mut ingest = FrameIngest::new(&ctx, stream_info());
    ingest.on_frame_ready(frame(0, &released), &detections(1)).unwrap();

    let received = receiver.receive_frame(true).unwrap();
    assert_eq!(received.header.detections.len(), 2);
    assert_eq!(received.header.detections[0], detections(1)[0]);
    assert_eq!(received.header.detections[1].name, "a-very-long-clas");
    assert!(received.header.fragment_count >= 1);

    let image = image::load_from_memory(&received.image).unwrap();
    assert_eq!((image.width(), image.height()), (640, 480));

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(stats.datagrams_sent, 1 + received.header.fragment_count as u64);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_consecutive_frames() {
    let (mut receiver, ctx) = viewer(true);
    let handle = start_worker(&ctx);
    let released = Arc::new(AtomicUsize::new(0));
    let mut ingest = FrameIngest::new(&ctx, stream_info());

    for n in 0..3 {
        ingest
            .on_frame_ready(frame(n * 33_333, &released), &detections(n as i32))
            .unwrap();
        let received = receiver.receive_frame(true).unwrap();
        assert_eq!(received.header.detections[0].category, n as i32);
    }

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.frames_sent, 3);
    assert_eq!(released.load(Ordering::SeqCst), 3);
}

#[test]
fn test_latest_frame_wins() {
    let (mut receiver, ctx) = viewer(false);
    let released = Arc::new(AtomicUsize::new(0));
    let mut ingest = FrameIngest::new(&ctx, stream_info());

    // Worker not running yet: only the newest survives.
    for n in 0..3 {
        ingest.on_frame_ready(frame(n, &released), &detections(n as i32)).unwrap();
    }
    assert_eq!(released.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.queue.superseded(), 2);

    let handle = start_worker(&ctx);
    let received = receiver.receive_frame(false).unwrap();
    assert_eq!(received.header.detections[0].category, 2);

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(released.load(Ordering::SeqCst), 3);
    assert!(matches!(
        receiver.receive_frame(false),
        Err(RelayError::Timeout(_))
    ));
}

#[test]
fn test_empty_capture_is_rejected() {
    let (_receiver, ctx) = viewer(true);
    let mut ingest = FrameIngest::new(&ctx, stream_info());
    let empty = Frame {
        buffer: FrameBuffer::new(Vec::<u8>::new()),
        timestamp_us: 0,
    };
    assert!(matches!(
        ingest.on_frame_ready(empty, &[]),
        Err(RelayError::InvalidBuffer)
    ));
    assert_eq!(ctx.queue.published(), 0);
}

// ── Control channel ──────────────────────────────────────────────

async fn command(client: &mut TcpStream, text: &[u8]) -> Vec<u8> {
    client.write_all(text).await.unwrap();
    let mut reply = [0u8; 64];
    let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut reply))
        .await
        .expect("timeout")
        .unwrap();
    reply[..n].to_vec()
}

#[tokio::test]
async fn test_stopvideo_sends_headers_only() {
    let (receiver, ctx) = viewer(true);
    let server = CommandServer::bind("127.0.0.1:0".parse().unwrap(), ctx.streaming.clone())
        .await
        .unwrap();
    let control_addr = server.local_addr().unwrap();
    let server_task = tokio::spawn(server.run());

    let mut client = TcpStream::connect(control_addr).await.unwrap();
    assert_eq!(command(&mut client, b"status").await, b"ready");
    assert_eq!(command(&mut client, b"stopvideo\0").await, b"stopvideo\0");
    assert!(!ctx.streaming.is_enabled());

    let handle = start_worker(&ctx);
    let released = Arc::new(AtomicUsize::new(0));
    let mut ingest = FrameIngest::new(&ctx, stream_info());
    ingest.on_frame_ready(frame(0, &released), &detections(5)).unwrap();

    // One header, and no second frame behind it.
    let (header, trailing) = tokio::task::spawn_blocking(move || {
        let mut receiver = receiver;
        let header = receiver.receive_frame(false).unwrap();
        let trailing = receiver.receive_frame(false);
        (header, trailing)
    })
    .await
    .unwrap();
    assert_eq!(header.header.detections[0].category, 5);
    assert!(header.header.fragment_count >= 1);
    assert!(matches!(trailing, Err(RelayError::Timeout(_))));

    assert_eq!(command(&mut client, b"startvideo\0").await, b"startvideo\0");
    assert!(ctx.streaming.is_enabled());
    assert_eq!(command(&mut client, b"status").await, b"ready");

    let stats = tokio::task::spawn_blocking(move || handle.shutdown().unwrap())
        .await
        .unwrap();
    assert_eq!(stats.frames_sent, 1);
    assert_eq!(stats.datagrams_sent, 1);

    server_task.abort();
}

#[tokio::test]
async fn test_control_survives_client_disconnect() {
    let flag = StreamingFlag::new(true);
    let server = CommandServer::bind("127.0.0.1:0".parse().unwrap(), flag.clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let server_task = tokio::spawn(server.run());

    {
        let mut first = TcpStream::connect(addr).await.unwrap();
        assert_eq!(command(&mut first, b"stopvideo").await, b"stopvideo");
    }

    let mut second = TcpStream::connect(addr).await.unwrap();
    assert_eq!(command(&mut second, b"status").await, b"ready");
    assert!(!flag.is_enabled());

    server_task.abort();
}

#[test]
fn test_udp_sink_targets_context_destination() {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let ctx = RelayContext::new(socket.local_addr().unwrap(), StreamingFlag::default());
    let sink = UdpSink::bind(ctx.destination).unwrap();
    assert_eq!(sink.destination(), ctx.destination);
}
