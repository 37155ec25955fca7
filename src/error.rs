//! Structured outcomes for command handlers, mapped to FTP reply codes in
//! one place. Sensitive detail (host paths, TLS errors) stays in the log;
//! clients only ever see the standard reply text.

use thiserror::Error;

use crate::core_ftpcommand::Reply;
use crate::core_network::BrokerError;
use crate::core_sandbox::PathError;
use crate::core_transfer::TransferError;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown command {0}")]
    Unknown(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("bad command sequence: {0}")]
    BadSequence(String),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("permission denied")]
    PermissionDenied,

    #[error("path outside the sandbox or not usable")]
    InvalidPath,

    #[error("file or directory not found")]
    NotFound,

    #[error("could not open data connection")]
    DataChannelFailed,

    #[error("no data channel configured")]
    NoDataChannel,

    #[error("transfer aborted")]
    TransferAborted,

    #[error("local processing error")]
    LocalError,

    #[error("TLS is not available")]
    TlsUnavailable,

    /// Control-channel I/O failure; the session terminates without a reply.
    #[error("fatal session error: {0}")]
    Fatal(#[from] std::io::Error),
}

impl CommandError {
    pub fn to_reply(&self) -> Reply {
        match self {
            CommandError::Protocol(text) => Reply::new(501, text.clone()),
            CommandError::Unknown(verb) => Reply::new(500, format!("Unknown command: {}", verb)),
            CommandError::Unsupported(text) => Reply::new(504, text.clone()),
            CommandError::BadSequence(text) => Reply::new(503, text.clone()),
            CommandError::NotLoggedIn => Reply::new(530, "Please login with USER and PASS."),
            CommandError::PermissionDenied => Reply::new(550, "Permission denied."),
            CommandError::InvalidPath => Reply::new(550, "Invalid path."),
            CommandError::NotFound => Reply::new(550, "File or directory not found."),
            CommandError::DataChannelFailed => Reply::new(425, "Can't open data connection."),
            CommandError::NoDataChannel => Reply::new(425, "Use PASV or PORT first."),
            CommandError::TransferAborted => {
                Reply::new(426, "Connection closed; transfer aborted.")
            }
            CommandError::LocalError => {
                Reply::new(451, "Requested action aborted. Local error in processing.")
            }
            CommandError::TlsUnavailable => Reply::new(534, "TLS not available."),
            CommandError::Fatal(_) => Reply::new(421, "Service not available, closing."),
        }
    }

    /// Maps filesystem errors from handlers that already vetted the path.
    pub fn from_fs(e: std::io::Error) -> CommandError {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::NotFound => CommandError::NotFound,
            ErrorKind::PermissionDenied => CommandError::PermissionDenied,
            _ => CommandError::LocalError,
        }
    }
}

impl From<PathError> for CommandError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::Escape => CommandError::InvalidPath,
            PathError::Io(io) => match io.kind() {
                std::io::ErrorKind::NotFound => CommandError::NotFound,
                _ => CommandError::LocalError,
            },
        }
    }
}

impl From<BrokerError> for CommandError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::NotConfigured => CommandError::NoDataChannel,
            _ => CommandError::DataChannelFailed,
        }
    }
}

impl From<TransferError> for CommandError {
    fn from(_: TransferError) -> Self {
        CommandError::TransferAborted
    }
}
