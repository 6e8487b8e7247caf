//! Line framing
//!
//! Each frame is one JSON-encoded [`StreamItem`] terminated by `\n`. Frames
//! are encoded once into `Bytes` so fan-out to many peers shares the same
//! allocation.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::item::StreamItem;
use super::CodecError;

/// Default maximum frame length in bytes
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 4 * 1024;

/// Encode an item into a newline-terminated frame
pub fn encode_frame(item: &StreamItem) -> Result<Bytes, CodecError> {
    let mut buf = serde_json::to_vec(item)?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}

/// Decode a single frame (with or without its terminator)
pub fn decode_frame(line: &[u8]) -> Result<StreamItem, CodecError> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Ok(serde_json::from_slice(line)?)
}

/// Splits an inbound byte stream into frames
///
/// `next_frame` is cancel safe: bytes already read stay buffered.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with the default frame limit
    pub fn new(inner: R) -> Self {
        Self::with_max_frame_len(inner, DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a reader with a custom frame limit
    pub fn with_max_frame_len(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK),
            max_frame_len,
        }
    }

    /// Read the next frame, without its terminator
    ///
    /// Returns `Ok(None)` at end of input. A trailing frame without a
    /// terminator is still returned. A frame longer than the limit is an
    /// `InvalidData` error.
    pub async fn next_frame(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let line = self.buf.split_to(pos + 1).freeze();
                return Ok(Some(line.slice(..pos)));
            }

            if self.buf.len() > self.max_frame_len {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "frame exceeds maximum length",
                ));
            }

            self.buf.reserve(READ_CHUNK);
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.buf.split().freeze()));
            }
        }
    }

    /// Read and decode the next item
    ///
    /// Blank lines are skipped. Decode failures are returned per frame so
    /// the caller can drop a bad frame and keep reading.
    pub async fn next_item(&mut self) -> io::Result<Option<Result<StreamItem, CodecError>>> {
        loop {
            match self.next_frame().await? {
                None => return Ok(None),
                Some(line) if line.iter().all(u8::is_ascii_whitespace) => continue,
                Some(line) => return Ok(Some(decode_frame(&line))),
            }
        }
    }
}
