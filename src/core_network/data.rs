//! Brokers the secondary TCP connection used for file transfers.
//!
//! A session configures at most one pending setup (a passive listener or an
//! active target); issuing a new PASV or PORT discards the previous one.
//! `obtain` turns the setup into a live stream exactly once, optionally
//! wrapping it in TLS when the session protection level is Private.

use std::net::SocketAddrV4;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_rustls::server::TlsStream;

use crate::core_tls::{TlsContext, TlsError};

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("no data channel configured")]
    NotConfigured,
    #[error("data connection timed out")]
    Timeout,
    #[error("no free port in the passive range")]
    NoFreePort,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tls(#[from] TlsError),
}

/// Pending data-channel configuration carried by a session.
#[derive(Debug, Default)]
pub enum DataChannelSetup {
    #[default]
    None,
    /// Server-opened listener awaiting the client (PASV).
    Passive { listener: TcpListener, port: u16 },
    /// Client-side endpoint the server will connect to (PORT).
    Active { peer: SocketAddrV4 },
}

impl DataChannelSetup {
    pub fn is_configured(&self) -> bool {
        !matches!(self, DataChannelSetup::None)
    }

    /// Drops any pending listener or target.
    pub fn discard(&mut self) {
        *self = DataChannelSetup::None;
    }
}

/// A live data connection, possibly TLS-protected.
#[derive(Debug)]
pub enum DataStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for DataStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match &mut *self {
            DataStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DataStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match &mut *self {
            DataStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut *self {
            DataStream::Plain(s) => Pin::new(s).poll_flush(cx),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut *self {
            DataStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            DataStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Consumes the pending setup and produces a live data stream.
///
/// Passive listeners are single-use: they are closed after one accept, and
/// on timeout. When `tls` is given the socket is wrapped with a server-side
/// handshake before it is handed to the transfer engine.
pub async fn obtain(
    setup: &mut DataChannelSetup,
    deadline: Duration,
    tls: Option<&TlsContext>,
) -> Result<DataStream, BrokerError> {
    let stream = match std::mem::take(setup) {
        DataChannelSetup::None => return Err(BrokerError::NotConfigured),
        DataChannelSetup::Passive { listener, port } => {
            match timeout(deadline, listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    debug!("Accepted data connection from {} on port {}", peer, port);
                    stream
                }
                Ok(Err(e)) => return Err(BrokerError::Io(e)),
                Err(_) => return Err(BrokerError::Timeout),
            }
        }
        DataChannelSetup::Active { peer } => {
            match timeout(deadline, TcpStream::connect(peer)).await {
                Ok(Ok(stream)) => {
                    debug!("Connected data channel to {}", peer);
                    stream
                }
                Ok(Err(e)) => return Err(BrokerError::Io(e)),
                Err(_) => return Err(BrokerError::Timeout),
            }
        }
    };

    match tls {
        Some(context) => {
            let tls_stream = context.accept(stream).await?;
            Ok(DataStream::Tls(Box::new(tls_stream)))
        }
        None => Ok(DataStream::Plain(stream)),
    }
}
