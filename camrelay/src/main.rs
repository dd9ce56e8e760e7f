//! camrelay entry point.
//!
//! ```text
//! camrelay                          Run with camrelay.toml (or defaults)
//! camrelay --config <path>          Load a custom config TOML
//! camrelay --gen-config             Write default config to stdout
//! camrelay --write-config <path>    Write default config to a file
//! camrelay --frames 300             Stop after 300 frames
//! camrelay --timeout-ms 10000       Stop after 10 s
//! camrelay --destination host:port  Override the viewer address
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use camrelay::config::RelayConfig;
use camrelay::pattern::TestPatternSource;
use camrelay::service::RelayService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "camrelay", about = "Camera frame and detection relay")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "camrelay.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to a file and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// Stop after this many frames (0 = unlimited).
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// Stop after this many milliseconds (0 = no limit).
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Viewer address receiving the UDP stream.
    #[arg(short, long)]
    destination: Option<String>,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&RelayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // --write-config: bootstrap a config file and exit.
    if let Some(path) = &cli.write_config {
        RelayConfig::write_default(path)?;
        println!("Default configuration written to {}", path.display());
        return Ok(());
    }

    // Load config, then apply command-line overrides.
    let mut config = RelayConfig::load(&cli.config);
    if let Some(frames) = cli.frames {
        config.capture.frames = frames;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.capture.timeout_ms = timeout_ms;
    }
    if let Some(destination) = cli.destination {
        config.network.destination = destination;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("camrelay v{}", env!("CARGO_PKG_VERSION"));
    info!("destination: {}", config.network.destination);
    info!("command port: {}", config.network.command_port);
    info!(
        "capture: {}x{} {} @ {} fps",
        config.capture.width,
        config.capture.height,
        config.capture.pixel_format,
        config.capture.framerate
    );
    info!(
        "preview: {}x{} {}",
        config.stream.output_width, config.stream.output_height, config.stream.codec
    );

    let mut source = TestPatternSource::new(config.stream_info()?, config.capture.framerate)?;
    let service = RelayService::new(config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    // The capture loop blocks; keep it off the async workers.
    let (summary, produced, outstanding) = tokio::task::spawn_blocking(move || {
        let summary = service.run(&mut source);
        (summary, source.frames_produced(), source.outstanding())
    })
    .await?;
    let summary = summary?;
    if outstanding != 0 {
        warn!("{outstanding} frame buffers still outstanding after shutdown");
    }
    info!("source produced {produced} frames");
    info!(
        "relayed {} of {} frames ({} datagrams, {} bytes)",
        summary.worker.frames_sent,
        summary.frames_captured,
        summary.worker.datagrams_sent,
        summary.worker.bytes_sent
    );

    Ok(())
}
