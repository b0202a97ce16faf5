//! # msglink
//!
//! Connection-agnostic message endpoint: decouples *what* to send and
//! receive from *how* the transport is currently connected.
//!
//! An [`Endpoint`] accepts logical messages (event name + payload),
//! serializes them through a pluggable wire codec and hands them to the
//! installed transport sender - or holds them in a FIFO queue while no
//! transport is attached. When the transport signals that a channel is
//! ready, the queue drains in order. Inbound wire messages are decoded and
//! dispatched to listeners registered by event name, followed by a reserved
//! [`DELIVERED`] notification for pooling/cleanup observers.
//!
//! ## Send policies
//!
//! - [`Endpoint::send`] - guaranteed: queues while disconnected, so every
//!   successfully serialized message gets a delivery attempt after the next
//!   connect
//! - [`Endpoint::try_send`] - best-effort: drops while disconnected, so
//!   stale state never piles up (heartbeats, ephemeral notifications)
//!
//! ## Example
//!
//! ```ignore
//! use msglink::Endpoint;
//!
//! #[tokio::main]
//! async fn main() -> msglink::Result<()> {
//!     let mut endpoint = Endpoint::builder()
//!         .on("status", |text: String| async move {
//!             println!("peer says: {text}");
//!         })
//!         .build();
//!
//!     // Queued: no transport yet.
//!     endpoint.send("hello", &"world").await?;
//!
//!     // Transport wiring, typically done by an adapter like
//!     // `transport::StreamLink`.
//!     endpoint.set_sender(|wire| async move { deliver(wire).await });
//!     endpoint.connected(Some("peer-a".into())).await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod events;
pub mod transport;

mod endpoint;

pub use codec::{Envelope, WireMessage};
pub use endpoint::{DisconnectFn, Endpoint, EndpointBuilder, SendFn};
pub use error::{MsglinkError, Result};
pub use events::{ListenerId, DELIVERED};
