//! Configuration for the relay service.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use camrelay_core::relay::encoder::{DEFAULT_QUALITY, OUTPUT_HEIGHT, OUTPUT_WIDTH};
use camrelay_core::{
    DEFAULT_COMMAND_PORT, FRAGMENT_SIZE, FrameEncoder, ImageCodec, PixelFormat, RelayError,
    Result, StreamInfo,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Preview encoding and transmission.
    pub stream: StreamConfig,
    /// Capture source and run limits.
    pub capture: CaptureConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Viewer address (`host:port`) receiving the UDP stream.
    pub destination: String,
    /// TCP port for control commands. 0 picks a free port.
    pub command_port: u16,
    /// Address the command server binds to.
    pub command_bind: String,
}

/// Preview stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub output_width: u32,
    pub output_height: u32,
    /// Image codec: "jpeg" or "png".
    pub codec: String,
    /// JPEG quality, 1..=100.
    pub quality: u8,
    /// Maximum image bytes per UDP datagram.
    pub fragment_size: usize,
    /// How long the worker waits for a frame before rechecking shutdown.
    pub wait_timeout_ms: u64,
    /// Whether image fragments are sent before any `startvideo`.
    pub start_enabled: bool,
}

/// Capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    /// "yuv420", "nv12", "rgb888", "bgr888" or "xrgb8888".
    pub pixel_format: String,
    pub framerate: u32,
    /// Stop after this many frames (0 = unlimited).
    pub frames: u64,
    /// Stop after this many milliseconds (0 = no limit).
    pub timeout_ms: u64,
    /// Per-frame wait before the source is considered stalled.
    pub frame_timeout_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            destination: "192.168.1.1:9000".into(),
            command_port: DEFAULT_COMMAND_PORT,
            command_bind: "0.0.0.0".into(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            output_width: OUTPUT_WIDTH,
            output_height: OUTPUT_HEIGHT,
            codec: "jpeg".into(),
            quality: DEFAULT_QUALITY,
            fragment_size: FRAGMENT_SIZE,
            wait_timeout_ms: 200,
            start_enabled: true,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 960,
            pixel_format: "yuv420".into(),
            framerate: 30,
            frames: 0,
            timeout_ms: 0,
            frame_timeout_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl RelayConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    // ── Derived settings ─────────────────────────────────────────

    /// Resolve the viewer address. Host names take the first address.
    pub fn destination(&self) -> Result<SocketAddr> {
        resolve(&self.network.destination)
    }

    pub fn command_addr(&self) -> Result<SocketAddr> {
        resolve(&format!(
            "{}:{}",
            self.network.command_bind, self.network.command_port
        ))
    }

    pub fn to_encoder(&self) -> Result<FrameEncoder> {
        let codec = ImageCodec::from_name(&self.stream.codec, self.stream.quality)?;
        FrameEncoder::new(self.stream.output_width, self.stream.output_height, codec)
    }

    pub fn stream_info(&self) -> Result<StreamInfo> {
        let format: PixelFormat = self.capture.pixel_format.parse()?;
        Ok(StreamInfo::packed(
            self.capture.width,
            self.capture.height,
            format,
        ))
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.stream.wait_timeout_ms.max(1))
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.capture.frame_timeout_ms.max(1))
    }

    /// Overall run limit, if any.
    pub fn run_timeout(&self) -> Option<Duration> {
        (self.capture.timeout_ms > 0).then(|| Duration::from_millis(self.capture.timeout_ms))
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| RelayError::Config(format!("address {addr:?}: {e}")))?
        .next()
        .ok_or_else(|| RelayError::Config(format!("address {addr:?} did not resolve")))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&RelayConfig::default()).unwrap();
        assert!(text.contains("destination"));
        assert!(text.contains("fragment_size"));
        assert!(text.contains("pixel_format"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&RelayConfig::default()).unwrap();
        let parsed: RelayConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.command_port, 5556);
        assert_eq!(parsed.stream.quality, 80);
        assert_eq!(parsed.capture.framerate, 30);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: RelayConfig = toml::from_str(
            r#"
            [network]
            destination = "127.0.0.1:7000"

            [stream]
            codec = "png"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.destination().unwrap(), "127.0.0.1:7000".parse().unwrap());
        assert_eq!(parsed.network.command_port, 5556);
        assert_eq!(parsed.to_encoder().unwrap().codec(), ImageCodec::Png);
        assert_eq!(parsed.stream.output_width, 640);
    }

    #[test]
    fn derived_settings() {
        let mut cfg = RelayConfig::default();
        assert_eq!(cfg.destination().unwrap().port(), 9000);
        assert_eq!(cfg.command_addr().unwrap().port(), 5556);
        assert_eq!(cfg.run_timeout(), None);
        assert_eq!(cfg.wait_timeout(), Duration::from_millis(200));

        let info = cfg.stream_info().unwrap();
        assert_eq!((info.width, info.height), (1280, 960));
        assert_eq!(info.pixel_format, PixelFormat::Yuv420);

        cfg.capture.timeout_ms = 1500;
        cfg.capture.pixel_format = "nv12".into();
        assert_eq!(cfg.run_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(cfg.stream_info().unwrap().pixel_format, PixelFormat::Nv12);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let mut cfg = RelayConfig::default();
        cfg.network.destination = "not an address".into();
        assert!(matches!(cfg.destination(), Err(RelayError::Config(_))));

        cfg.stream.codec = "gif".into();
        assert!(cfg.to_encoder().is_err());

        cfg.capture.pixel_format = "yuyv".into();
        assert!(matches!(
            cfg.stream_info(),
            Err(RelayError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn written_default_loads_back() {
        let path = std::env::temp_dir().join(format!("camrelay-{}.toml", std::process::id()));
        RelayConfig::write_default(&path).unwrap();
        let cfg = RelayConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.network.destination, "192.168.1.1:9000");
        assert_eq!(cfg.stream.fragment_size, 4096);
        assert_eq!(cfg.capture.pixel_format, "yuv420");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = RelayConfig::load(Path::new("/nonexistent/camrelay.toml"));
        assert_eq!(cfg.network.destination, "192.168.1.1:9000");
    }
}
