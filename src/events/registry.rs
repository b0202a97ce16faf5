//! Listener registry for dispatching envelopes by event name.
//!
//! The registry maps event names to listeners and manages ID assignment.
//! IDs are handed back on registration and are the only way to remove a
//! listener again.
//!
//! # Example
//!
//! ```
//! use msglink::events::ListenerRegistry;
//!
//! let mut registry = ListenerRegistry::new();
//!
//! let id = registry.on("ping", |seq: u32| async move {
//!     let _ = seq;
//! });
//!
//! assert_eq!(registry.listener_count("ping"), 1);
//! assert!(registry.remove(&id));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::codec::{Envelope, MsgPackCodec};

/// Boxed future used for listener invocations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for event listeners.
///
/// Listeners receive the full envelope; their results are ignored by the
/// dispatch loop.
pub trait Listener: Send + Sync {
    /// Invoke the listener with a dispatched envelope.
    fn call(&self, envelope: Envelope) -> BoxFuture<'static, ()>;
}

/// Wrapper that MsgPack-decodes the payload before calling the listener.
///
/// A payload that fails to decode logs a warning and skips this listener;
/// other listeners on the same event still run.
pub struct TypedListener<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    listener: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedListener<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    /// Create a new typed listener.
    pub fn new(listener: F) -> Self {
        Self {
            listener,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Listener for TypedListener<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, envelope: Envelope) -> BoxFuture<'static, ()> {
        let parsed: T = match MsgPackCodec::decode(&envelope.payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    "Listener payload for '{}' failed to decode, skipping listener: {}",
                    envelope.event,
                    e
                );
                return Box::pin(async {});
            }
        };

        Box::pin((self.listener)(parsed))
    }
}

/// Wrapper for listeners that want the envelope as-is.
pub struct EnvelopeListener<F, Fut>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    listener: F,
}

impl<F, Fut> EnvelopeListener<F, Fut>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    /// Create a new envelope listener.
    pub fn new(listener: F) -> Self {
        Self { listener }
    }
}

impl<F, Fut> Listener for EnvelopeListener<F, Fut>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, envelope: Envelope) -> BoxFuture<'static, ()> {
        Box::pin((self.listener)(envelope))
    }
}

/// Handle identifying a registered listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId {
    event: String,
    seq: u64,
}

impl ListenerId {
    /// Event name this listener is registered under.
    pub fn event(&self) -> &str {
        &self.event
    }
}

/// Entry for a registered listener.
struct ListenerEntry {
    seq: u64,
    listener: Arc<dyn Listener>,
    once: bool,
}

/// Registry mapping event names to listeners.
///
/// Dispatch operates on a snapshot of the listeners registered at dispatch
/// start: registrations and removals that happen while listener futures are
/// being awaited take effect for the next dispatch, never the current one.
pub struct ListenerRegistry {
    listeners: HashMap<String, Vec<ListenerEntry>>,
    next_seq: u64,
}

impl ListenerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_seq: 1,
        }
    }

    /// Register a typed listener. Payloads are MsgPack-decoded to `T`
    /// before invocation.
    pub fn on<T, F, Fut>(&mut self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(event, Arc::new(TypedListener::new(listener)), false)
    }

    /// Register a typed listener removed after its first invocation.
    pub fn once<T, F, Fut>(&mut self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(event, Arc::new(TypedListener::new(listener)), true)
    }

    /// Register a listener that receives the raw envelope.
    pub fn on_raw<F, Fut>(&mut self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(event, Arc::new(EnvelopeListener::new(listener)), false)
    }

    /// Register a raw-envelope listener removed after its first invocation.
    pub fn once_raw<F, Fut>(&mut self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(event, Arc::new(EnvelopeListener::new(listener)), true)
    }

    /// Register a boxed listener.
    pub fn register(
        &mut self,
        event: &str,
        listener: Arc<dyn Listener>,
        once: bool,
    ) -> ListenerId {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(ListenerEntry {
                seq,
                listener,
                once,
            });

        ListenerId {
            event: event.to_string(),
            seq,
        }
    }

    /// Remove a listener by its registration handle.
    ///
    /// Returns `true` if the listener was still registered.
    pub fn remove(&mut self, id: &ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(&id.event) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|e| e.seq != id.seq);
        let removed = entries.len() != before;

        if entries.is_empty() {
            self.listeners.remove(&id.event);
        }

        removed
    }

    /// Number of listeners registered under an event.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    /// Dispatch an envelope to all listeners registered under its event.
    ///
    /// Listeners are awaited sequentially in registration order; their
    /// results are ignored. Once-listeners are unregistered before their
    /// future is awaited. Returns the number of listeners invoked.
    pub async fn dispatch(&mut self, envelope: &Envelope) -> usize {
        self.dispatch_to(&envelope.event, envelope).await
    }

    /// Dispatch an envelope to the listeners of an explicit event name.
    ///
    /// Used for the reserved delivery notification, where the notification
    /// name differs from the envelope's own event.
    pub async fn dispatch_to(&mut self, event: &str, envelope: &Envelope) -> usize {
        let snapshot: Vec<Arc<dyn Listener>> = match self.listeners.get_mut(event) {
            Some(entries) => {
                let snap = entries.iter().map(|e| e.listener.clone()).collect();
                entries.retain(|e| !e.once);
                if entries.is_empty() {
                    self.listeners.remove(event);
                }
                snap
            }
            None => return 0,
        };

        let invoked = snapshot.len();
        for listener in snapshot {
            listener.call(envelope.clone()).await;
        }

        invoked
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn envelope_for<T: serde::Serialize>(event: &str, payload: &T) -> Envelope {
        Envelope::new(event, Bytes::from(MsgPackCodec::encode(payload).unwrap()))
    }

    #[test]
    fn test_register_and_count() {
        let mut registry = ListenerRegistry::new();

        registry.on("ping", |_: u32| async {});
        registry.on("ping", |_: u32| async {});
        registry.on("pong", |_: u32| async {});

        assert_eq!(registry.listener_count("ping"), 2);
        assert_eq!(registry.listener_count("pong"), 1);
        assert_eq!(registry.listener_count("absent"), 0);
    }

    #[test]
    fn test_remove_listener() {
        let mut registry = ListenerRegistry::new();

        let id = registry.on("ping", |_: u32| async {});
        let other = registry.on("ping", |_: u32| async {});

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id), "second removal is a no-op");
        assert_eq!(registry.listener_count("ping"), 1);
        assert!(registry.remove(&other));
        assert_eq!(registry.listener_count("ping"), 0);
    }

    #[tokio::test]
    async fn test_dispatch_invokes_all_listeners() {
        let mut registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = hits.clone();
            registry.on("tick", move |n: u32| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(n as usize, Ordering::SeqCst);
                }
            });
        }

        let invoked = registry.dispatch(&envelope_for("tick", &2u32)).await;

        assert_eq!(invoked, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_event_is_noop() {
        let mut registry = ListenerRegistry::new();
        let invoked = registry.dispatch(&envelope_for("nobody", &0u32)).await;
        assert_eq!(invoked, 0);
    }

    #[tokio::test]
    async fn test_once_listener_runs_single_time() {
        let mut registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        registry.once("tick", move |_: u32| {
            let hits = hits_clone.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });

        registry.dispatch(&envelope_for("tick", &1u32)).await;
        registry.dispatch(&envelope_for("tick", &1u32)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.listener_count("tick"), 0);
    }

    #[tokio::test]
    async fn test_typed_listener_skips_on_decode_failure() {
        let mut registry = ListenerRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_clone = hits.clone();
        registry.on("tick", move |_: String| {
            let hits = hits_clone.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });

        // u32 payload does not decode as String; the listener is skipped
        // but dispatch still completes.
        let invoked = registry.dispatch(&envelope_for("tick", &7u32)).await;

        assert_eq!(invoked, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_raw_listener_receives_envelope() {
        let mut registry = ListenerRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_clone = seen.clone();
        registry.on_raw("blob", move |env: Envelope| {
            let seen = seen_clone.clone();
            async move {
                seen.store(env.payload.len(), Ordering::SeqCst);
            }
        });

        let env = Envelope::new("blob", Bytes::from_static(b"12345"));
        registry.dispatch(&env).await;

        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }
}
