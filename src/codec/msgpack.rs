//! MsgPack codec using `rmp-serde`.
//!
//! Always encodes with `to_vec_named` so structs become MsgPack maps (field
//! names on the wire) rather than positional arrays. Peers on the other side
//! of a link are frequently not Rust, and map-format payloads are the only
//! representation every mainstream MsgPack implementation decodes without a
//! schema.
//!
//! # Example
//!
//! ```
//! use msglink::codec::MsgPackCodec;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Ping {
//!     seq: u32,
//! }
//!
//! let encoded = MsgPackCodec::encode(&Ping { seq: 7 }).unwrap();
//! let decoded: Ping = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, Ping { seq: 7 });
//! ```

use crate::error::Result;

/// MessagePack codec for structured payloads.
///
/// Uses `rmp_serde::to_vec_named` so structs serialize as maps, which keeps
/// payloads decodable by non-Rust peers.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
