//! Envelope type and pluggable wire codecs.
//!
//! An [`Envelope`] is the logical message the endpoint works with: an event
//! name plus opaque payload bytes. A [`WireCodec`] turns envelopes into wire
//! messages and back; the codec is supplied at endpoint construction and is
//! the only place the wire format is decided.
//!
//! Two implementations ship with the crate:
//!
//! - [`MsgPackWireCodec`] - MsgPack map `{event, payload}` (default)
//! - [`JsonWireCodec`] - JSON object, for peers without a MsgPack decoder
//!
//! # Example
//!
//! ```
//! use msglink::codec::{Envelope, MsgPackWireCodec, WireCodec};
//! use bytes::Bytes;
//!
//! let codec = MsgPackWireCodec;
//! let envelope = Envelope::new("ping", Bytes::from_static(b"\x01"));
//!
//! let wire = codec.encode(&envelope).unwrap();
//! let back = codec.decode(&wire).unwrap();
//! assert_eq!(back.event, "ping");
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The serialized form produced by a [`WireCodec`] and consumed by the
/// transport and the peer's decoder.
pub type WireMessage = Bytes;

/// A logical message: event name plus payload bytes.
///
/// The payload is already value-encoded (MsgPack on the typed endpoint
/// paths, arbitrary bytes on the raw paths); the envelope only pairs it
/// with the event name it should be dispatched under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Event name the payload is dispatched under.
    pub event: String,
    /// Opaque payload bytes.
    pub payload: Bytes,
}

impl Envelope {
    /// Create a new envelope.
    pub fn new(event: impl Into<String>, payload: Bytes) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Pluggable serializer/deserializer between envelopes and wire messages.
///
/// Both directions are total functions except for explicitly returned
/// errors, which the endpoint contains as non-fatal drops: an encode error
/// drops the outbound message, a decode error discards the inbound one.
pub trait WireCodec: Send + Sync {
    /// Serialize an envelope into a wire message.
    fn encode(&self, envelope: &Envelope) -> Result<Bytes>;

    /// Deserialize a wire message back into an envelope.
    fn decode(&self, raw: &[u8]) -> Result<Envelope>;
}

/// Borrowed form used on the encode side (avoids cloning the payload).
#[derive(Serialize)]
struct WireEnvelopeRef<'a> {
    event: &'a str,
    #[serde(with = "serde_bytes")]
    payload: &'a [u8],
}

/// Owned form used on the decode side.
#[derive(Deserialize)]
struct WireEnvelope {
    event: String,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

/// Default wire codec: MsgPack map `{event, payload}`.
///
/// Uses `to_vec_named` so the envelope is a map on the wire, decodable by
/// any MsgPack implementation without a schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackWireCodec;

impl WireCodec for MsgPackWireCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Bytes> {
        let wire = WireEnvelopeRef {
            event: &envelope.event,
            payload: &envelope.payload,
        };
        Ok(Bytes::from(rmp_serde::to_vec_named(&wire)?))
    }

    fn decode(&self, raw: &[u8]) -> Result<Envelope> {
        let wire: WireEnvelope = rmp_serde::from_slice(raw)?;
        Ok(Envelope {
            event: wire.event,
            payload: Bytes::from(wire.payload),
        })
    }
}

/// Alternative wire codec: JSON object `{event, payload}`.
///
/// Payload bytes serialize as a JSON number array. Slower and larger than
/// MsgPack; useful when the peer has no MsgPack decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWireCodec;

impl WireCodec for JsonWireCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Bytes> {
        let wire = WireEnvelopeRef {
            event: &envelope.event,
            payload: &envelope.payload,
        };
        Ok(Bytes::from(serde_json::to_vec(&wire)?))
    }

    fn decode(&self, raw: &[u8]) -> Result<Envelope> {
        let wire: WireEnvelope = serde_json::from_slice(raw)?;
        Ok(Envelope {
            event: wire.event,
            payload: Bytes::from(wire.payload),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope::new("progress", Bytes::from_static(&[0x01, 0x02, 0xFF]))
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let codec = MsgPackWireCodec;
        let wire = codec.encode(&sample()).unwrap();
        let back = codec.decode(&wire).unwrap();

        assert_eq!(back, sample());
    }

    #[test]
    fn test_msgpack_wire_is_map() {
        let codec = MsgPackWireCodec;
        let wire = codec.encode(&sample()).unwrap();

        // fixmap with 2 entries
        assert_eq!(wire[0], 0x82);
    }

    #[test]
    fn test_json_roundtrip() {
        let codec = JsonWireCodec;
        let wire = codec.encode(&sample()).unwrap();
        let back = codec.decode(&wire).unwrap();

        assert_eq!(back, sample());
    }

    #[test]
    fn test_json_wire_is_object() {
        let codec = JsonWireCodec;
        let wire = codec.encode(&sample()).unwrap();
        let text = std::str::from_utf8(&wire).unwrap();

        assert!(text.starts_with('{'));
        assert!(text.contains("\"event\""));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let garbage = b"\xc1\xc1\xc1 definitely not an envelope";

        assert!(MsgPackWireCodec.decode(garbage).is_err());
        assert!(JsonWireCodec.decode(garbage).is_err());
    }

    #[test]
    fn test_empty_payload() {
        let codec = MsgPackWireCodec;
        let envelope = Envelope::new("tick", Bytes::new());

        let back = codec.decode(&codec.encode(&envelope).unwrap()).unwrap();
        assert_eq!(back.event, "tick");
        assert!(back.payload.is_empty());
    }
}
