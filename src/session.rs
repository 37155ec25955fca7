//! Per-connection protocol state and the control-channel command loop.
//!
//! One session runs in one task and owns its control socket outright. The
//! supervisor reaches it only through the shared [`SessionHandle`], which
//! carries the stop flag and activity clock the reaper reads.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use log::{debug, error, info};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::server::TlsStream;

use crate::constants::MAX_COMMAND_LINE;
use crate::core_ftpcommand::handlers::{self, CommandOutcome};
use crate::core_ftpcommand::Reply;
use crate::core_network::DataChannelSetup;
use crate::core_tls::TlsError;
use crate::core_transfer::TransferType;
use crate::server::ServerContext;
use crate::supervisor::SessionHandle;
use crate::users::User;

/// Where the session stands in the USER/PASS exchange.
#[derive(Debug, Clone)]
pub enum AuthStage {
    AwaitingUser,
    AwaitingPass(String),
    Authenticated(User),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionLevel {
    Clear,
    Private,
}

/// Control socket, plain or upgraded. `Closed` only exists transiently
/// while AUTH TLS swaps the transport.
pub enum ControlStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Closed,
}

impl AsyncRead for ControlStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            ControlStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            ControlStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            ControlStream::Closed => Poll::Ready(Ok(())),
        }
    }
}

impl AsyncWrite for ControlStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            ControlStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            ControlStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            ControlStream::Closed => {
                Poll::Ready(Err(io::Error::from(io::ErrorKind::NotConnected)))
            }
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            ControlStream::Plain(s) => Pin::new(s).poll_flush(cx),
            ControlStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            ControlStream::Closed => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            ControlStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            ControlStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            ControlStream::Closed => Poll::Ready(Ok(())),
        }
    }
}

pub struct Session {
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub auth: AuthStage,
    /// Absolute host path; always inside the authenticated user's home.
    pub cwd: PathBuf,
    pub transfer_type: TransferType,
    pub protection: ProtectionLevel,
    pub tls_active: bool,
    pub pbsz_done: bool,
    pub data_setup: DataChannelSetup,
    pub rename_from: Option<PathBuf>,
    pub resume_offset: u64,
    pub handle: Arc<SessionHandle>,

    control: ControlStream,
    inbuf: Vec<u8>,
    overflowed: bool,
    pending_line: String,
}

impl Session {
    pub fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
        handle: Arc<SessionHandle>,
    ) -> Session {
        Session {
            peer_addr,
            local_addr,
            auth: AuthStage::AwaitingUser,
            cwd: PathBuf::new(),
            transfer_type: TransferType::Ascii,
            protection: ProtectionLevel::Clear,
            tls_active: false,
            pbsz_done: false,
            data_setup: DataChannelSetup::None,
            rename_from: None,
            resume_offset: 0,
            handle,
            control: ControlStream::Plain(stream),
            inbuf: Vec::new(),
            overflowed: false,
            pending_line: String::new(),
        }
    }

    pub fn user(&self) -> Option<&User> {
        match &self.auth {
            AuthStage::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Runs the command loop to completion, then releases the session's
    /// sockets and marks the handle inactive for the supervisor.
    pub async fn run(mut self, ctx: Arc<ServerContext>) {
        if let Err(e) = self.serve(&ctx).await {
            debug!("Session {} ended with error: {}", self.peer_addr, e);
        }
        self.data_setup.discard();
        let _ = self.control.shutdown().await;
        self.handle.mark_inactive();
        info!("Connection closed for {}", self.peer_addr);
    }

    async fn serve(&mut self, ctx: &ServerContext) -> io::Result<()> {
        let banner = Reply::new(220, format!("{} FTP server ready.", ctx.config.server_name));
        self.send_reply(&banner).await?;

        let idle = Duration::from_secs(u64::from(ctx.config.connection.timeout_seconds));

        loop {
            if !self.handle.is_active() {
                break;
            }
            let stop = Arc::clone(&self.handle);
            let line = tokio::select! {
                _ = stop.stopped() => break,
                read = timeout(idle, self.read_command()) => match read {
                    Err(_) => {
                        let _ = self.send_reply(&Reply::new(421, "Timeout.")).await;
                        break;
                    }
                    Ok(Ok(None)) => break,
                    Ok(Ok(Some(line))) => line,
                    Ok(Err(e)) => return Err(e),
                },
            };

            if line.is_empty() {
                continue;
            }
            self.handle.touch();

            match handlers::dispatch(self, ctx, &line).await? {
                CommandOutcome::Continue => {}
                CommandOutcome::Quit => break,
                CommandOutcome::StartTls => {
                    if let Err(e) = self.upgrade_tls(ctx).await {
                        error!("TLS handshake with {} failed: {}", self.peer_addr, e);
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn send_reply(&mut self, reply: &Reply) -> io::Result<()> {
        let rendered = reply.to_string();
        log::trace!("{} <- {}", self.peer_addr, rendered.trim_end());
        self.control.write_all(rendered.as_bytes()).await?;
        self.control.flush().await
    }

    /// Reads one command line, tolerating CRLF or lone LF termination.
    /// Returns `None` at EOF. Lines beyond the protocol limit are clipped
    /// and the overflow discarded; the clipped line is still dispatched.
    pub async fn read_command(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.inbuf.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.inbuf.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if self.overflowed {
                    self.overflowed = false;
                    return Ok(Some(std::mem::take(&mut self.pending_line)));
                }
                let mut line = String::from_utf8_lossy(&line).into_owned();
                crate::core_ftpcommand::ftpcommand::clip_line(&mut line);
                return Ok(Some(line));
            }

            if self.inbuf.len() > MAX_COMMAND_LINE {
                if !self.overflowed {
                    self.overflowed = true;
                    self.pending_line =
                        String::from_utf8_lossy(&self.inbuf[..MAX_COMMAND_LINE]).into_owned();
                }
                self.inbuf.clear();
            }

            let mut chunk = [0u8; 1024];
            let n = self.control.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.inbuf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Performs the server-side AUTH TLS handshake over the control socket.
    /// The 234 reply has already been written by the AUTH handler.
    async fn upgrade_tls(&mut self, ctx: &ServerContext) -> Result<(), TlsError> {
        let tls = ctx.tls.as_ref().ok_or(TlsError::NotConfigured)?;

        let plain = match std::mem::replace(&mut self.control, ControlStream::Closed) {
            ControlStream::Plain(stream) => stream,
            other => {
                self.control = other;
                return Err(TlsError::Config(String::from(
                    "control channel is already secured",
                )));
            }
        };

        let tls_stream = tls.accept(plain).await?;
        self.control = ControlStream::Tls(Box::new(tls_stream));
        self.tls_active = true;
        // Any plaintext bytes that trailed the AUTH command are meaningless
        // after the handshake.
        self.inbuf.clear();
        self.overflowed = false;
        info!("Control channel upgraded to TLS for {}", self.peer_addr);
        Ok(())
    }

    pub fn record_upload(&self, bytes: u64) {
        self.handle.stats.files_received.fetch_add(1, Ordering::Relaxed);
        self.handle.stats.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_download(&self, bytes: u64) {
        self.handle.stats.files_sent.fetch_add(1, Ordering::Relaxed);
        self.handle.stats.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }
}
