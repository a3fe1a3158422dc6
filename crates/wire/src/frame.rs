// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited JSON framing over any async byte stream.

use futures_util::StreamExt;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use warden_core::ProtocolError;

/// Reads frames from a pipe or socket, skipping empty lines and rejecting
/// frames over `max_frame_size`.
pub struct FrameReader<R> {
    inner: FramedRead<R, LinesCodec>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self { inner: FramedRead::new(reader, LinesCodec::new_with_max_length(max_frame_size)) }
    }

    /// Next non-empty frame; `None` on clean EOF. An oversized frame is a
    /// terminal error — callers must close the channel.
    pub async fn next_frame(&mut self) -> Option<Result<String, ProtocolError>> {
        loop {
            match self.inner.next().await? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(Ok(line)),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    return Some(Err(ProtocolError::FrameTooLarge))
                }
                Err(LinesCodecError::Io(e)) => {
                    return Some(Err(ProtocolError::MalformedFrame(e.to_string())))
                }
            }
        }
    }
}

/// Serialize `value` into one newline-terminated frame.
pub fn encode_frame<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write raw frame bytes followed by the frame delimiter.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> std::io::Result<()> {
    writer.write_all(data).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
