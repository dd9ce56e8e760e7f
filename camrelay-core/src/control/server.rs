//! Serial TCP command server.
//!
//! One client at a time: the next connection is accepted only after the
//! current one closes. There is no cancellation path; the server lives
//! as long as the process.

use std::io;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::control::command::ControlCommand;
use crate::error::Result;
use crate::relay::context::StreamingFlag;

pub const DEFAULT_COMMAND_PORT: u16 = 5556;

/// Receive buffer size; one byte is kept spare so a read never fills it.
const RECV_BUFFER_SIZE: usize = 4096;

// ── CommandServer ────────────────────────────────────────────────

pub struct CommandServer {
    listener: TcpListener,
    streaming: StreamingFlag,
}

impl CommandServer {
    pub async fn bind(addr: SocketAddr, streaming: StreamingFlag) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("command server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            streaming,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve clients forever.
    pub async fn run(self) {
        loop {
            let (mut stream, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                warn!("TCP_NODELAY on {peer}: {e}");
            }
            info!("control client connected from {peer}");

            match handle_client(&mut stream, &self.streaming).await {
                Ok(commands) => info!("control client {peer} disconnected ({commands} commands)"),
                Err(e) => warn!("control client {peer} dropped: {e}"),
            }
        }
    }
}

/// Serve one connection until the peer closes it or an I/O error occurs.
///
/// Returns the number of recognised commands.
pub async fn handle_client<IO>(io: &mut IO, streaming: &StreamingFlag) -> io::Result<u64>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; RECV_BUFFER_SIZE];
    let mut handled = 0;

    loop {
        let n = io.read(&mut buf[..RECV_BUFFER_SIZE - 1]).await?;
        if n == 0 {
            return Ok(handled);
        }
        let received = &buf[..n];

        let Some(command) = ControlCommand::parse(received) else {
            debug!(len = n, "unrecognised control input ignored");
            continue;
        };

        let reply = command.apply(streaming, received);
        io.write_all(reply).await?;
        handled += 1;
        debug!(?command, streaming = streaming.is_enabled(), "control command");
    }
}

// ── Thread helper ────────────────────────────────────────────────

/// Run a [`CommandServer`] on its own thread with a single-threaded
/// runtime.
///
/// A bind failure is logged and ends the thread; frame relay keeps
/// running without a control channel.
pub fn spawn_command_server(addr: SocketAddr, streaming: StreamingFlag) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("command-server".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("command server runtime: {e}");
                    return;
                }
            };

            runtime.block_on(async move {
                match CommandServer::bind(addr, streaming).await {
                    Ok(server) => server.run().await,
                    Err(e) => error!("command server bind {addr} failed: {e}"),
                }
            });
        })
}

// ── Tests ────────────────────────────────────────────────────────
