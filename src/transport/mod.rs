//! Transport integration for byte-stream links.
//!
//! The endpoint core is transport-agnostic; this module bundles the one
//! adapter most integrations need:
//!
//! - [`LengthDelimitedBuffer`] / [`encode_frame`] - 4-byte length-prefix
//!   framing with partial-read accumulation
//! - [`StreamLink`] - drives an endpoint over any `AsyncRead + AsyncWrite`
//!   stream, wiring the send/disconnect hooks and the connect/disconnect
//!   transitions

mod framing;
mod stream;

pub use framing::{
    encode_frame, LengthDelimitedBuffer, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE,
};
pub use stream::{StreamLink, StreamLinkConfig, DEFAULT_CHANNEL_CAPACITY};
