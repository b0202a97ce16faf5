//! Error types for msglink.

use thiserror::Error;

/// Main error type for all msglink operations.
#[derive(Debug, Error)]
pub enum MsglinkError {
    /// I/O error from the underlying stream transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// JSON serialization/deserialization error (JSON wire codec only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (oversized frame, malformed envelope, reserved event name).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No transport sender installed when one was required.
    #[error("No transport sender installed")]
    SenderMissing,

    /// No disconnect hook installed when `disconnect()` was called.
    #[error("No disconnect hook installed")]
    DisconnectMissing,

    /// Transport channel closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using MsglinkError.
pub type Result<T> = std::result::Result<T, MsglinkError>;
