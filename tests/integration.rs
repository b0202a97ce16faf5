//! Integration tests for msglink.
//!
//! These tests verify the integration between the endpoint, the codecs and
//! the stream transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::Bytes;
use msglink::codec::{Envelope, MsgPackWireCodec, WireCodec};
use msglink::transport::{encode_frame, LengthDelimitedBuffer, StreamLink};
use msglink::{Endpoint, MsglinkError, WireMessage, DELIVERED};
use tokio::sync::Mutex;

/// Install a sender that records every wire message it is handed.
fn recording_sender(endpoint: &mut Endpoint) -> Arc<StdMutex<Vec<WireMessage>>> {
    let sent = Arc::new(StdMutex::new(Vec::new()));
    let sink = sent.clone();
    endpoint.set_sender(move |wire| {
        let sink = sink.clone();
        async move {
            sink.lock().unwrap().push(wire);
            Ok(())
        }
    });
    sent
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within timeout");
}

/// Messages sent while disconnected reach the transport on connect, in
/// order, and the peer descriptor sticks.
#[tokio::test]
async fn test_offline_sends_flush_on_connect() {
    let mut endpoint = Endpoint::builder().build();
    let sent = recording_sender(&mut endpoint);

    endpoint.send("ping", &1u32).await.unwrap();
    endpoint.send("ping", &2u32).await.unwrap();
    assert!(
        sent.lock().unwrap().is_empty(),
        "transport must not be invoked before connect"
    );

    endpoint.connected(Some("peerA".into())).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 2);

    let first = MsgPackWireCodec.decode(&sent[0]).unwrap();
    let second = MsgPackWireCodec.decode(&sent[1]).unwrap();
    assert_eq!(first.event, "ping");
    assert_eq!(second.event, "ping");
    assert_eq!(
        rmp_serde::from_slice::<u32>(&first.payload).unwrap(),
        1,
        "queued messages keep their order"
    );
    assert_eq!(rmp_serde::from_slice::<u32>(&second.payload).unwrap(), 2);
    assert_eq!(endpoint.address(), Some("peerA"));
    assert_eq!(endpoint.queued(), 0);
}

/// A deserializer that rejects its input fires no listeners and no
/// delivery notification.
#[tokio::test]
async fn test_undecodable_inbound_is_inert() {
    struct RejectsBad;

    impl WireCodec for RejectsBad {
        fn encode(&self, envelope: &Envelope) -> msglink::Result<WireMessage> {
            MsgPackWireCodec.encode(envelope)
        }

        fn decode(&self, raw: &[u8]) -> msglink::Result<Envelope> {
            if raw == b"bad" {
                return Err(MsglinkError::Protocol("bad input".into()));
            }
            MsgPackWireCodec.decode(raw)
        }
    }

    let mut endpoint = Endpoint::builder().codec(RejectsBad).build();
    let _sent = recording_sender(&mut endpoint);
    endpoint.connected(Some("peerA".into())).await.unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    for event in ["bad", DELIVERED] {
        let hits = hits.clone();
        endpoint.on_raw(event, move |_env: Envelope| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    endpoint.receive_message(b"bad").await;

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

/// Wire messages survive framing intact: encode, frame, accumulate,
/// extract, decode.
#[test]
fn test_wire_message_through_framing() {
    let envelope = Envelope::new("update", Bytes::from_static(&[1, 2, 3]));
    let wire = MsgPackWireCodec.encode(&envelope).unwrap();
    let frame = encode_frame(&wire);

    let mut buffer = LengthDelimitedBuffer::new();

    // Feed in two fragments, as a socket read might.
    let split = frame.len() / 2;
    assert!(buffer.push(&frame[..split]).unwrap().is_empty());
    let messages = buffer.push(&frame[split..]).unwrap();

    assert_eq!(messages.len(), 1);
    let decoded = MsgPackWireCodec.decode(&messages[0]).unwrap();
    assert_eq!(decoded, envelope);
}

/// Queue and listeners survive repeated connect/disconnect cycles; hooks
/// can be rewired each time.
#[tokio::test]
async fn test_reconnect_cycles() {
    let mut endpoint = Endpoint::builder().build();

    endpoint.send("seq", &0u32).await.unwrap();

    for round in 1u32..=3 {
        let sent = recording_sender(&mut endpoint);
        endpoint
            .connected(Some(format!("peer-{round}")))
            .await
            .unwrap();

        // The message queued during the previous offline window arrives.
        assert_eq!(sent.lock().unwrap().len(), 1);
        let envelope = MsgPackWireCodec.decode(&sent.lock().unwrap()[0]).unwrap();
        assert_eq!(
            rmp_serde::from_slice::<u32>(&envelope.payload).unwrap(),
            round - 1
        );

        endpoint.disconnected();
        assert_eq!(endpoint.address(), None);

        endpoint.send("seq", &round).await.unwrap();
        assert_eq!(endpoint.queued(), 1);
    }
}

/// Two endpoints talking over an in-memory duplex stream: typed dispatch,
/// delivery notification, teardown via the disconnect hook.
#[tokio::test]
async fn test_end_to_end_over_duplex() {
    let (near_stream, far_stream) = tokio::io::duplex(16 * 1024);

    let near = Arc::new(Mutex::new(Endpoint::builder().build()));

    let greetings = Arc::new(StdMutex::new(Vec::new()));
    let delivered = Arc::new(AtomicUsize::new(0));

    let seen = greetings.clone();
    let notified = delivered.clone();
    let far = Arc::new(Mutex::new(
        Endpoint::builder()
            .on("greet", move |text: String| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(text);
                }
            })
            .on_raw(DELIVERED, move |env: Envelope| {
                let notified = notified.clone();
                async move {
                    assert_eq!(env.event, "greet");
                    notified.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build(),
    ));

    // Queued before any transport exists; must arrive after the link is up.
    near.lock().await.send("greet", &"queued hello").await.unwrap();

    let near_link = StreamLink::new(near.clone());
    let far_link = StreamLink::new(far.clone());
    let near_task = tokio::spawn(async move { near_link.run(near_stream, "far").await });
    let far_task = tokio::spawn(async move { far_link.run(far_stream, "near").await });

    {
        let greetings = greetings.clone();
        wait_until(move || greetings.lock().unwrap().len() == 1).await;
    }

    near.lock().await.send("greet", &"live hello").await.unwrap();

    {
        let greetings = greetings.clone();
        wait_until(move || greetings.lock().unwrap().len() == 2).await;
    }

    {
        let delivered = delivered.clone();
        wait_until(move || delivered.load(Ordering::SeqCst) == 2).await;
    }

    assert_eq!(
        greetings.lock().unwrap().as_slice(),
        ["queued hello", "live hello"]
    );
    assert_eq!(near.lock().await.address(), Some("far"));
    assert_eq!(far.lock().await.address(), Some("near"));

    // Tear down from the near side; both links wind down.
    near.lock().await.disconnect().await.unwrap();
    near_task.await.unwrap().unwrap();
    far_task.await.unwrap().unwrap();

    assert!(!near.lock().await.is_connected());
    assert!(!far.lock().await.is_connected());
}

/// Best-effort sends are dropped while offline even when a link later
/// comes up.
#[tokio::test]
async fn test_try_send_never_buffers() {
    let mut endpoint = Endpoint::builder().build();
    let sent = recording_sender(&mut endpoint);

    endpoint.try_send("heartbeat", &1u32).await.unwrap();
    endpoint.send("state", &2u32).await.unwrap();
    endpoint.try_send("heartbeat", &3u32).await.unwrap();
    assert_eq!(endpoint.queued(), 1);

    endpoint.connected(None).await.unwrap();

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1, "only the guaranteed send went out");
    let envelope = MsgPackWireCodec.decode(&sent[0]).unwrap();
    assert_eq!(envelope.event, "state");
}
