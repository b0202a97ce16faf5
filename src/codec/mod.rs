//! Codec module - serialization between values, envelopes and wire messages.
//!
//! Two layers:
//!
//! - [`MsgPackCodec`] - typed values to payload bytes (`rmp-serde`,
//!   `to_vec_named` for struct-as-map format)
//! - [`WireCodec`] - pluggable [`Envelope`] to wire-message serialization,
//!   with [`MsgPackWireCodec`] (default) and [`JsonWireCodec`] implementations
//!
//! The endpoint owns one `WireCodec` for the link's wire format; the typed
//! payload layer is fixed to MsgPack the same way on both sides of a link.

mod envelope;
mod msgpack;

pub use envelope::{Envelope, JsonWireCodec, MsgPackWireCodec, WireCodec, WireMessage};
pub use msgpack::MsgPackCodec;
