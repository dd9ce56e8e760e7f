//! Relay service: wires the shared context, the worker and the command
//! server around a capture source and drives the capture loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use camrelay_core::{
    FrameIngest, FrameSource, FrameTransport, RelayContext, RelayWorker, Result, SourceEvent,
    StreamInfoProvider, StreamingFlag, UdpSink, WorkerStats, spawn_command_server,
};

use crate::config::RelayConfig;

/// What a finished run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_captured: u64,
    pub source_restarts: u64,
    pub worker: WorkerStats,
}

// ── RelayService ─────────────────────────────────────────────────

pub struct RelayService {
    config: RelayConfig,
    running: Arc<AtomicBool>,
}

impl RelayService {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task (e.g. the Ctrl-C handler).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Relay frames from `source` until a stop condition is met.
    ///
    /// 1. Starts the command server thread and the worker thread.
    /// 2. Starts the source and feeds each capture to the ingest path.
    /// 3. Restarts the source whenever a capture times out.
    /// 4. Stops on the frame limit, the run timeout, the stop handle, or
    ///    when the source quits; then drains the worker and stops the
    ///    source.
    ///
    /// A stop requested before `run` is honoured: no frame is captured.
    /// The service is single-use; it reports not running afterwards.
    pub fn run<S>(&self, source: &mut S) -> Result<RunSummary>
    where
        S: FrameSource + StreamInfoProvider,
    {
        let result = self.relay(source);
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running (or has not been stopped yet).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Internal ─────────────────────────────────────────────────

    fn relay<S>(&self, source: &mut S) -> Result<RunSummary>
    where
        S: FrameSource + StreamInfoProvider,
    {
        let destination = self.config.destination()?;
        let context = RelayContext::new(
            destination,
            StreamingFlag::new(self.config.stream.start_enabled),
        );

        // Detached: the server has no shutdown path and ends with the process.
        spawn_command_server(self.config.command_addr()?, context.streaming.clone())?;

        let transport = FrameTransport::new(UdpSink::bind(destination)?)
            .with_fragment_size(self.config.stream.fragment_size)?;
        let worker = RelayWorker::new(&context, self.config.to_encoder()?, transport)
            .with_wait_timeout(self.config.wait_timeout())
            .spawn()?;
        info!("relaying to {destination}");

        let result = source
            .start()
            .and_then(|()| self.capture_loop(source, &context));
        source.stop();

        let stats = worker.shutdown()?;

        let (frames_captured, source_restarts) = result?;
        info!(
            frames_captured,
            source_restarts,
            sent = stats.frames_sent,
            skipped = stats.frames_skipped,
            failed = stats.frames_failed,
            "relay service stopped"
        );
        Ok(RunSummary {
            frames_captured,
            source_restarts,
            worker: stats,
        })
    }

    fn capture_loop<S>(&self, source: &mut S, context: &RelayContext) -> Result<(u64, u64)>
    where
        S: FrameSource + StreamInfoProvider,
    {
        let mut ingest = FrameIngest::new(context, source.stream_info());
        let frame_limit = self.config.capture.frames;
        let run_timeout = self.config.run_timeout();
        let frame_timeout = self.config.frame_timeout();
        let started = Instant::now();

        let mut restarts = 0u64;

        while self.running.load(Ordering::SeqCst) {
            if frame_limit != 0 && ingest.header_count() >= frame_limit {
                info!("frame limit of {frame_limit} reached");
                break;
            }
            if run_timeout.is_some_and(|limit| started.elapsed() >= limit) {
                info!("run timeout reached");
                break;
            }

            match source.next_frame(frame_timeout)? {
                SourceEvent::Frame(capture) => {
                    ingest.on_frame_ready(capture.frame, &capture.detections)?;
                }
                SourceEvent::Timeout => {
                    warn!("no frame within {frame_timeout:?}; restarting source");
                    source.stop();
                    source.start()?;
                    ingest.reset_stream_start();
                    restarts += 1;
                }
                SourceEvent::Quit => {
                    info!("source finished");
                    break;
                }
            }
        }

        Ok((ingest.header_count(), restarts))
    }
}

// ── Tests ────────────────────────────────────────────────────────
