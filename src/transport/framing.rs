//! Length-delimited framing for byte-stream transports.
//!
//! Wire messages are opaque byte strings, so the stream adapter prefixes
//! each one with a 4-byte big-endian length. [`LengthDelimitedBuffer`]
//! accumulates partial reads with `bytes::BytesMut` and extracts complete
//! messages with a two-state machine:
//! - `WaitingForLength`: need 4 bytes
//! - `WaitingForBody`: length parsed, need N more body bytes
//!
//! # Example
//!
//! ```
//! use msglink::transport::{encode_frame, LengthDelimitedBuffer};
//!
//! let mut buffer = LengthDelimitedBuffer::new();
//! let frame = encode_frame(b"hello");
//!
//! let messages = buffer.push(&frame).unwrap();
//! assert_eq!(&messages[0][..], b"hello");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{MsglinkError, Result};

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum message size accepted off the wire (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Build the outbound frame for one wire message.
pub fn encode_frame(body: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + body.len());
    frame.put_u32(body.len() as u32);
    frame.put_slice(body);
    frame.freeze()
}

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for the complete 4-byte length prefix.
    WaitingForLength,
    /// Length parsed, waiting for body bytes.
    WaitingForBody { remaining: u32 },
}

/// Buffer accumulating incoming bytes and extracting complete messages.
///
/// All data lives in a single `BytesMut`; extracted bodies are zero-copy
/// `split_to(..).freeze()` slices of it.
pub struct LengthDelimitedBuffer {
    /// Accumulated bytes from stream reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum accepted body size.
    max_frame_size: u32,
}

impl LengthDelimitedBuffer {
    /// Create a buffer with the default max message size.
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a buffer with a custom max message size.
    pub fn with_max_frame(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForLength,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Fragmented data is buffered internally for the next push; the
    /// returned vector may be empty.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a length prefix exceeds the configured
    /// maximum; the buffer is unusable for the stream afterwards.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(body) = self.try_extract_one()? {
            messages.push(body);
        }

        Ok(messages)
    }

    /// Try to extract a single message body from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        match &self.state {
            State::WaitingForLength => {
                if self.buffer.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
                prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_SIZE]);
                let length = u32::from_be_bytes(prefix);

                if length > self.max_frame_size {
                    return Err(MsglinkError::Protocol(format!(
                        "Frame size {} exceeds maximum {}",
                        length, self.max_frame_size
                    )));
                }

                let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);

                if length == 0 {
                    return Ok(Some(Bytes::new()));
                }

                self.state = State::WaitingForBody { remaining: length };
                self.try_extract_one()
            }

            State::WaitingForBody { remaining } => {
                let remaining = *remaining as usize;

                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let body = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForLength;

                Ok(Some(body))
            }
        }
    }

    /// Number of buffered bytes not yet part of a complete message.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer and reset the parsing state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForLength;
    }
}

impl Default for LengthDelimitedBuffer {
    fn default() -> Self {
        Self::new()
    }
}
