// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Line-delimited framing: one JSON object (or batch array) per `\n`.
//!
//! Both transports speak this shape at the byte level even though one rides
//! a Unix socket and the other a WebSocket text frame (§4.4); the WebSocket
//! transport hands this module one already-delimited message per frame
//! instead of scanning for `\n` itself.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializes `value` to a single-line JSON buffer (no trailing newline;
/// [`write_line`] appends the delimiter).
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, FramingError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FramingError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Reads one `\n`-terminated line, stripping the delimiter and any trailing
/// `\r`. Returns `Ok(None)` on a clean EOF with nothing left to read (the
/// peer closed the connection between messages), and an error on a
/// truncated final line.
pub async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, FramingError> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(buf))
}

/// Writes `bytes` followed by `\n` and flushes. The writer side of a
/// connection is always a single task (§4.4); callers must serialize their
/// own access if shared.
pub async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> Result<(), FramingError> {
    writer.write_all(bytes).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn round_trips_a_single_line() {
        let mut buffer = Vec::new();
        write_line(&mut buffer, b"hello").await.unwrap();
        assert_eq!(buffer, b"hello\n");

        let mut reader = BufReader::new(std::io::Cursor::new(buffer));
        let line = read_line(&mut reader).await.unwrap().unwrap();
        assert_eq!(line, b"hello");
    }

    #[tokio::test]
    async fn eof_between_messages_returns_none() {
        let mut reader = BufReader::new(std::io::Cursor::new(Vec::<u8>::new()));
        assert!(read_line(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn strips_trailing_cr() {
        let mut reader = BufReader::new(std::io::Cursor::new(b"hi\r\n".to_vec()));
        let line = read_line(&mut reader).await.unwrap().unwrap();
        assert_eq!(line, b"hi");
    }

    #[test]
    fn encode_decode_round_trip() {
        let value = serde_json::json!({"a": 1});
        let bytes = encode(&value).unwrap();
        let back: serde_json::Value = decode(&bytes).unwrap();
        assert_eq!(back, value);
    }
}
