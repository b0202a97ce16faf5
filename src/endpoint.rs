//! Connection-agnostic message endpoint.
//!
//! The [`Endpoint`] decouples what to send and receive from how the
//! transport is currently connected. Outbound messages are serialized and
//! handed to the installed transport sender while connected, or held in a
//! FIFO queue otherwise; the queue is drained through the sender when the
//! transport signals [`Endpoint::connected`]. Inbound wire messages are
//! decoded and dispatched to registered listeners, followed by the reserved
//! [`DELIVERED`] notification.
//!
//! Transport hooks are late-bound: they can be installed, replaced and
//! re-installed across reconnects without resetting the queue or the
//! listener registry.
//!
//! # Example
//!
//! ```ignore
//! use msglink::Endpoint;
//!
//! #[tokio::main]
//! async fn main() -> msglink::Result<()> {
//!     let mut endpoint = Endpoint::builder()
//!         .on("pong", |seq: u32| async move {
//!             println!("pong {seq}");
//!         })
//!         .build();
//!
//!     // Not connected yet: the message is queued.
//!     endpoint.send("ping", &1u32).await?;
//!
//!     endpoint.set_sender(|wire| async move {
//!         deliver_somehow(wire).await
//!     });
//!
//!     // Transport is ready: the queue drains through the sender.
//!     endpoint.connected(Some("peer-a".into())).await?;
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::future::Future;

use serde::de::DeserializeOwned;

use crate::codec::{Envelope, MsgPackCodec, MsgPackWireCodec, WireCodec, WireMessage};
use crate::error::{MsglinkError, Result};
use crate::events::{BoxFuture, ListenerId, ListenerRegistry, DELIVERED};

/// Transport hook that delivers one wire message.
///
/// Returns an explicit completion signal whether the underlying delivery is
/// synchronous or asynchronous, so queue ordering never depends on which
/// kind of transport is installed.
pub type SendFn = Box<dyn Fn(WireMessage) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Transport hook that requests connection teardown.
pub type DisconnectFn = Box<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Builder for configuring and creating an [`Endpoint`].
///
/// Use the fluent API to pick a wire codec, install initial transport hooks
/// and pre-register listeners, then call `build()`.
pub struct EndpointBuilder {
    codec: Box<dyn WireCodec>,
    send_fn: Option<SendFn>,
    disconnect_fn: Option<DisconnectFn>,
    listeners: ListenerRegistry,
}

impl EndpointBuilder {
    /// Create a new builder with the default MsgPack wire codec.
    pub fn new() -> Self {
        Self {
            codec: Box::new(MsgPackWireCodec),
            send_fn: None,
            disconnect_fn: None,
            listeners: ListenerRegistry::new(),
        }
    }

    /// Replace the wire codec.
    pub fn codec(mut self, codec: impl WireCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Install the initial transport sender.
    pub fn sender<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(WireMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.send_fn = Some(Box::new(move |wire| Box::pin(f(wire))));
        self
    }

    /// Install the initial disconnect hook.
    pub fn disconnector<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.disconnect_fn = Some(Box::new(move || Box::pin(f())));
        self
    }

    /// Pre-register a typed listener.
    pub fn on<T, F, Fut>(mut self, event: &str, listener: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on(event, listener);
        self
    }

    /// Pre-register a raw-envelope listener.
    pub fn on_raw<F, Fut>(mut self, event: &str, listener: F) -> Self
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_raw(event, listener);
        self
    }

    /// Build the endpoint. It starts disconnected with an empty queue.
    pub fn build(self) -> Endpoint {
        Endpoint {
            connected: false,
            address: None,
            codec: self.codec,
            send_fn: self.send_fn,
            disconnect_fn: self.disconnect_fn,
            queue: VecDeque::new(),
            listeners: self.listeners,
        }
    }
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A connection-agnostic message endpoint.
///
/// Owns the connection flag, the pending-message queue and the listener
/// registry. All operations run on one logical task; integrations that
/// share an endpoint across tasks must wrap it in a mutex (see
/// [`StreamLink`](crate::transport::StreamLink)).
pub struct Endpoint {
    /// True iff a transport is attached and ready.
    connected: bool,
    /// Opaque descriptor of the current peer; set on connect, cleared on
    /// disconnect.
    address: Option<String>,
    /// Wire codec for this link.
    codec: Box<dyn WireCodec>,
    /// Late-bound transport sender.
    send_fn: Option<SendFn>,
    /// Late-bound disconnect hook.
    disconnect_fn: Option<DisconnectFn>,
    /// Wire messages produced while disconnected, oldest first.
    queue: VecDeque<WireMessage>,
    /// Listener registry for inbound dispatch.
    listeners: ListenerRegistry,
}

impl Endpoint {
    /// Create an endpoint builder.
    pub fn builder() -> EndpointBuilder {
        EndpointBuilder::new()
    }

    /// Create an endpoint with the given wire codec and no hooks.
    pub fn new(codec: impl WireCodec + 'static) -> Self {
        EndpointBuilder::new().codec(codec).build()
    }

    /// Whether a transport is currently attached and ready.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Current peer descriptor, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Overwrite the stored peer descriptor. No side effects beyond storage.
    pub fn set_address(&mut self, address: Option<String>) {
        self.address = address;
    }

    /// Number of wire messages waiting for the next connect.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Install or replace the transport sender. Callable at any time,
    /// including while connected.
    pub fn set_sender<F, Fut>(&mut self, f: F)
    where
        F: Fn(WireMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.send_fn = Some(Box::new(move |wire| Box::pin(f(wire))));
    }

    /// Install or replace the disconnect hook.
    pub fn set_disconnector<F, Fut>(&mut self, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.disconnect_fn = Some(Box::new(move || Box::pin(f())));
    }

    /// Transition to connected and drain the queue through the sender.
    ///
    /// A supplied descriptor overwrites the stored one; `None` leaves it
    /// untouched. Calling this while already connected is a no-op drain
    /// (the queue is empty by then).
    ///
    /// # Errors
    ///
    /// Propagates drain failures. On failure the endpoint reverts to
    /// disconnected and the unsent messages (failed entry first) stay
    /// queued in order for a future connect; nothing is lost.
    pub async fn connected(&mut self, descriptor: Option<String>) -> Result<()> {
        self.connected = true;
        if let Some(d) = descriptor {
            self.address = Some(d);
        }
        self.drain_queue().await
    }

    /// Transition to disconnected and clear the peer descriptor.
    ///
    /// The queue and the listener registry are left untouched; subsequent
    /// `send` calls buffer again.
    pub fn disconnected(&mut self) {
        self.connected = false;
        self.address = None;
    }

    /// Request connection teardown via the installed disconnect hook.
    ///
    /// Does not flip the connection state itself; the state changes only
    /// when the transport reports back through [`Endpoint::disconnected`].
    ///
    /// # Errors
    ///
    /// Returns `DisconnectMissing` if no hook is installed; otherwise
    /// propagates the hook's outcome.
    pub async fn disconnect(&self) -> Result<()> {
        let hook = self
            .disconnect_fn
            .as_ref()
            .ok_or(MsglinkError::DisconnectMissing)?;
        hook().await
    }

    /// Serialize an event and payload into a wire message.
    ///
    /// Serialization failures are contained here: they are logged with the
    /// current address context and yield `None`, and the message is
    /// dropped. Callers must check the result.
    pub fn prepare<T: serde::Serialize>(&self, event: &str, payload: &T) -> Option<WireMessage> {
        let payload = match MsgPackCodec::encode(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    "Failed to serialize payload for '{}' ({}): {}",
                    event,
                    self.address_context(),
                    e
                );
                return None;
            }
        };

        self.prepare_raw(event, &payload)
    }

    /// Wrap pre-encoded payload bytes into a wire message.
    ///
    /// Same containment contract as [`Endpoint::prepare`].
    pub fn prepare_raw(&self, event: &str, payload: &[u8]) -> Option<WireMessage> {
        if event == DELIVERED {
            tracing::warn!(
                "'{}' is reserved for delivery notifications, dropping message ({})",
                DELIVERED,
                self.address_context()
            );
            return None;
        }

        let envelope = Envelope::new(event, bytes::Bytes::copy_from_slice(payload));
        match self.codec.encode(&envelope) {
            Ok(wire) => Some(wire),
            Err(e) => {
                tracing::warn!(
                    "Failed to encode envelope for '{}' ({}): {}",
                    event,
                    self.address_context(),
                    e
                );
                None
            }
        }
    }

    /// Guaranteed send: deliver now if connected, queue otherwise.
    ///
    /// A message that fails to serialize is dropped and reported via the
    /// log; the call still completes `Ok`.
    pub async fn send<T: serde::Serialize>(&mut self, event: &str, payload: &T) -> Result<()> {
        match self.prepare(event, payload) {
            Some(wire) => self.send_prepared(wire).await,
            None => Ok(()),
        }
    }

    /// Guaranteed send with pre-encoded payload bytes.
    pub async fn send_raw(&mut self, event: &str, payload: &[u8]) -> Result<()> {
        match self.prepare_raw(event, payload) {
            Some(wire) => self.send_prepared(wire).await,
            None => Ok(()),
        }
    }

    /// Guaranteed send of an already-serialized wire message.
    ///
    /// While connected the message goes straight to the sender and its
    /// outcome propagates; while disconnected it is appended to the queue
    /// tail and delivered on the next connect.
    ///
    /// # Panics
    ///
    /// Panics if called while connected with a non-empty queue. The queue
    /// is drained during the connect transition, so a non-empty queue here
    /// means the surrounding integration bypassed that ordering; this is a
    /// logic fault, not a recoverable condition.
    ///
    /// # Errors
    ///
    /// Returns `SenderMissing` if connected with no sender installed;
    /// otherwise propagates the sender's outcome.
    pub async fn send_prepared(&mut self, message: WireMessage) -> Result<()> {
        if self.connected {
            assert!(
                self.queue.is_empty(),
                "direct send while queued messages are pending"
            );

            let sender = self.send_fn.as_ref().ok_or(MsglinkError::SenderMissing)?;
            sender(message).await
        } else {
            self.queue.push_back(message);
            Ok(())
        }
    }

    /// Best-effort send: deliver now if connected, drop otherwise.
    ///
    /// Dropping while disconnected is expected behavior, not an error.
    /// Serialization is skipped entirely when disconnected. Use this for
    /// messages whose staleness makes buffering pointless (heartbeats,
    /// ephemeral notifications).
    pub async fn try_send<T: serde::Serialize>(&mut self, event: &str, payload: &T) -> Result<()> {
        if !self.connected {
            return Ok(());
        }

        match self.prepare(event, payload) {
            Some(wire) => self.send_prepared(wire).await,
            None => Ok(()),
        }
    }

    /// Best-effort send with pre-encoded payload bytes.
    pub async fn try_send_raw(&mut self, event: &str, payload: &[u8]) -> Result<()> {
        if !self.connected {
            return Ok(());
        }

        match self.prepare_raw(event, payload) {
            Some(wire) => self.send_prepared(wire).await,
            None => Ok(()),
        }
    }

    /// Best-effort send of an already-serialized wire message.
    pub async fn try_send_prepared(&mut self, message: WireMessage) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.send_prepared(message).await
    }

    /// Drain the queue through the sender, oldest first.
    ///
    /// Each delivery is awaited before the next starts: a freshly-opened
    /// transport sees queued messages strictly in the order they were
    /// produced. On the first failure the remaining messages (failed entry
    /// first) are kept queued and the endpoint reverts to disconnected, so
    /// the queue-only-while-disconnected invariant holds and a future
    /// connect retries them.
    async fn drain_queue(&mut self) -> Result<()> {
        if !self.connected || self.queue.is_empty() {
            return Ok(());
        }

        let sender = match self.send_fn.as_ref() {
            Some(s) => s,
            None => {
                self.connected = false;
                return Err(MsglinkError::SenderMissing);
            }
        };

        while let Some(message) = self.queue.pop_front() {
            if let Err(e) = sender(message.clone()).await {
                self.queue.push_front(message);
                self.connected = false;
                return Err(e);
            }
        }

        Ok(())
    }

    /// Decode an inbound wire message and dispatch it to listeners.
    ///
    /// Decode failures are contained: the message is discarded with a log
    /// entry and nothing is dispatched. On success all listeners for the
    /// event run (awaited sequentially, results ignored), and only after
    /// they complete is the same envelope dispatched to [`DELIVERED`]
    /// listeners.
    pub async fn receive_message(&mut self, raw: &[u8]) {
        let envelope = match self.codec.decode(raw) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(
                    "Discarding undecodable inbound message of {} bytes ({}): {}",
                    raw.len(),
                    self.address_context(),
                    e
                );
                return;
            }
        };

        if envelope.event == DELIVERED {
            tracing::warn!(
                "Peer sent a message under the reserved '{}' event, discarding ({})",
                DELIVERED,
                self.address_context()
            );
            return;
        }

        self.listeners.dispatch(&envelope).await;
        self.listeners.dispatch_to(DELIVERED, &envelope).await;
    }

    /// Register a typed listener. See [`ListenerRegistry::on`].
    pub fn on<T, F, Fut>(&mut self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on(event, listener)
    }

    /// Register a typed listener removed after its first invocation.
    pub fn once<T, F, Fut>(&mut self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.once(event, listener)
    }

    /// Register a raw-envelope listener.
    pub fn on_raw<F, Fut>(&mut self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_raw(event, listener)
    }

    /// Register a raw-envelope listener removed after its first invocation.
    pub fn once_raw<F, Fut>(&mut self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.once_raw(event, listener)
    }

    /// Remove a previously registered listener.
    pub fn remove_listener(&mut self, id: &ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Number of listeners registered under an event.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.listener_count(event)
    }

    fn address_context(&self) -> &str {
        self.address.as_deref().unwrap_or("no address")
    }
}
