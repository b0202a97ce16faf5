//! Event dispatch - listener registration and invocation by event name.
//!
//! The endpoint owns a [`ListenerRegistry`] rather than being an event
//! emitter itself; only the subset of emitter behavior the endpoint needs
//! is exposed (register, remove, dispatch, one reserved event name).

mod registry;

pub use registry::{
    BoxFuture, EnvelopeListener, Listener, ListenerId, ListenerRegistry, TypedListener,
};

/// Reserved event name emitted after every successful inbound dispatch.
///
/// Listeners registered under this name observe completed deliveries (for
/// pooling or cleanup); application messages must not be sent under it.
pub const DELIVERED: &str = "delivered";
