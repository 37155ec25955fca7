//! Streams file bytes between the local filesystem and a data channel.
//!
//! The engine honors the session transfer type on the fly: in Image type
//! bytes are copied verbatim, in ASCII type line endings are rewritten to
//! CRLF on the way out and to the host convention on the way in. EOF is
//! signaled to the peer by closing the data stream.

use std::io::SeekFrom;
use std::path::Path;

use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::constants::TRANSFER_BUFFER_SIZE;

pub mod listing;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("data transfer failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Image,
}

/// Sends `path` over `stream` starting at `offset`, returning the number of
/// file bytes read. The stream is shut down before returning so the client
/// sees EOF.
pub async fn send_file<S>(
    stream: &mut S,
    path: &Path,
    offset: u64,
    transfer_type: TransferType,
) -> Result<u64, TransferError>
where
    S: AsyncWrite + Unpin,
{
    let mut file = File::open(path).await?;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset)).await?;
    }

    let mut buffer = vec![0u8; TRANSFER_BUFFER_SIZE];
    let mut encoded = Vec::new();
    let mut sent: u64 = 0;

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        match transfer_type {
            TransferType::Image => stream.write_all(&buffer[..n]).await?,
            TransferType::Ascii => {
                encoded.clear();
                encode_ascii(&buffer[..n], &mut encoded);
                stream.write_all(&encoded).await?;
            }
        }
        sent += n as u64;
    }

    stream.flush().await?;
    stream.shutdown().await?;
    Ok(sent)
}

/// Receives bytes from `stream` into `path`, returning the number of file
/// bytes written. With `append` the offset is ignored and writes go to the
/// end; otherwise a nonzero offset seeks into an existing (or fresh) file.
/// A failed transfer leaves whatever was written in place.
pub async fn recv_file<S>(
    stream: &mut S,
    path: &Path,
    offset: u64,
    transfer_type: TransferType,
    append: bool,
) -> Result<u64, TransferError>
where
    S: AsyncRead + Unpin,
{
    let mut file = if append {
        OpenOptions::new().create(true).append(true).open(path).await?
    } else if offset > 0 {
        let mut file = OpenOptions::new().create(true).write(true).open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file
    } else {
        File::create(path).await?
    };

    let mut buffer = vec![0u8; TRANSFER_BUFFER_SIZE];
    let mut decoder = AsciiDecoder::default();
    let mut decoded = Vec::new();
    let mut received: u64 = 0;

    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        match transfer_type {
            TransferType::Image => {
                file.write_all(&buffer[..n]).await?;
                received += n as u64;
            }
            TransferType::Ascii => {
                decoded.clear();
                decoder.push(&buffer[..n], &mut decoded);
                file.write_all(&decoded).await?;
                received += decoded.len() as u64;
            }
        }
    }

    if transfer_type == TransferType::Ascii {
        decoded.clear();
        decoder.finish(&mut decoded);
        if !decoded.is_empty() {
            file.write_all(&decoded).await?;
            received += decoded.len() as u64;
        }
    }

    file.flush().await?;
    Ok(received)
}

/// Rewrites LF line endings as CRLF.
fn encode_ascii(input: &[u8], out: &mut Vec<u8>) {
    out.reserve(input.len());
    for &byte in input {
        if byte == b'\n' {
            out.push(b'\r');
        }
        out.push(byte);
    }
}

/// Rewrites CRLF line endings as LF, carrying a trailing CR across chunk
/// boundaries.
#[derive(Debug, Default)]
struct AsciiDecoder {
    pending_cr: bool,
}

impl AsciiDecoder {
    fn push(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len() + 1);
        for &byte in input {
            if self.pending_cr {
                self.pending_cr = false;
                if byte != b'\n' {
                    out.push(b'\r');
                }
            }
            if byte == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(byte);
            }
        }
    }

    fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            out.push(b'\r');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    #[test]
    fn encode_inserts_cr_before_lf() {
        let mut out = Vec::new();
        encode_ascii(b"one\ntwo\n", &mut out);
        assert_eq!(out, b"one\r\ntwo\r\n");
    }

    #[test]
    fn decode_strips_cr_from_crlf() {
        let mut decoder = AsciiDecoder::default();
        let mut out = Vec::new();
        decoder.push(b"one\r\ntwo\r\n", &mut out);
        decoder.finish(&mut out);
        assert_eq!(out, b"one\ntwo\n");
    }

    #[test]
    fn decode_carries_cr_across_chunks() {
        let mut decoder = AsciiDecoder::default();
        let mut out = Vec::new();
        decoder.push(b"one\r", &mut out);
        decoder.push(b"\ntwo", &mut out);
        decoder.finish(&mut out);
        assert_eq!(out, b"one\ntwo");
    }

    #[test]
    fn decode_keeps_lone_cr() {
        let mut decoder = AsciiDecoder::default();
        let mut out = Vec::new();
        decoder.push(b"a\rb", &mut out);
        decoder.finish(&mut out);
        assert_eq!(out, b"a\rb");

        let mut out = Vec::new();
        let mut decoder = AsciiDecoder::default();
        decoder.push(b"tail\r", &mut out);
        decoder.finish(&mut out);
        assert_eq!(out, b"tail\r");
    }

    #[tokio::test]
    async fn image_round_trip_preserves_bytes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        let payload: Vec<u8> = (0..=255u8).cycle().take(40_000).collect();
        std::fs::File::create(&src).unwrap().write_all(&payload).unwrap();

        let (mut tx, mut rx) = tokio::io::duplex(4096);
        let src_clone = src.clone();
        let sender = tokio::spawn(async move {
            send_file(&mut tx, &src_clone, 0, TransferType::Image).await
        });
        let received = recv_file(&mut rx, &dst, 0, TransferType::Image, false)
            .await
            .unwrap();
        let sent = sender.await.unwrap().unwrap();

        assert_eq!(sent, payload.len() as u64);
        assert_eq!(received, payload.len() as u64);
        assert_eq!(std::fs::read(&dst).unwrap(), payload);
    }

    #[tokio::test]
    async fn send_honors_resume_offset() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        std::fs::write(&src, b"0123456789").unwrap();

        let (mut tx, mut rx) = tokio::io::duplex(64);
        let src_clone = src.clone();
        let sender = tokio::spawn(async move {
            send_file(&mut tx, &src_clone, 4, TransferType::Image).await
        });
        let mut out = Vec::new();
        rx.read_to_end(&mut out).await.unwrap();
        assert_eq!(sender.await.unwrap().unwrap(), 6);
        assert_eq!(out, b"456789");
    }

    #[tokio::test]
    async fn recv_append_adds_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("dst.txt");
        std::fs::write(&dst, b"head:").unwrap();

        let (mut tx, mut rx) = tokio::io::duplex(64);
        tokio::spawn(async move {
            tx.write_all(b"tail").await.unwrap();
            tx.shutdown().await.unwrap();
        });
        recv_file(&mut rx, &dst, 0, TransferType::Image, true)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"head:tail");
    }

    #[tokio::test]
    async fn ascii_upload_translates_line_endings() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("dst.txt");

        let (mut tx, mut rx) = tokio::io::duplex(64);
        tokio::spawn(async move {
            tx.write_all(b"line1\r\nline2\r\n").await.unwrap();
            tx.shutdown().await.unwrap();
        });
        let received = recv_file(&mut rx, &dst, 0, TransferType::Ascii, false)
            .await
            .unwrap();
        assert_eq!(received, 12);
        assert_eq!(std::fs::read(&dst).unwrap(), b"line1\nline2\n");
    }
}
