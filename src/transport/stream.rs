//! Stream adapter - drives an endpoint over a duplex byte stream.
//!
//! The core never touches sockets; [`StreamLink`] is the bundled adapter
//! for any `AsyncRead + AsyncWrite` stream (TCP, Unix socket, in-memory
//! duplex). It wires the endpoint's transport hooks to a dedicated writer
//! task, signals the connect transition, then runs the read loop until the
//! stream ends.
//!
//! # Architecture
//!
//! ```text
//! Endpoint::send ──► SendFn ──► mpsc::Sender ──► Writer Task ──► stream
//! stream ──► read loop ──► LengthDelimitedBuffer ──► Endpoint::receive_message
//! ```
//!
//! The endpoint is shared behind `Arc<tokio::sync::Mutex<..>>`: the read
//! loop and application tasks both mutate it, and the mutex provides the
//! mutual exclusion the single-threaded core design requires of multi-task
//! integrations.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use msglink::{Endpoint, transport::StreamLink};
//! use tokio::sync::Mutex;
//!
//! let endpoint = Arc::new(Mutex::new(Endpoint::builder().build()));
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:9000").await?;
//!
//! let link = StreamLink::new(endpoint.clone());
//! tokio::spawn(async move {
//!     if let Err(e) = link.run(stream, "127.0.0.1:9000").await {
//!         tracing::error!("Link error: {}", e);
//!     }
//! });
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::codec::WireMessage;
use crate::endpoint::Endpoint;
use crate::error::{MsglinkError, Result};
use crate::transport::framing::{encode_frame, LengthDelimitedBuffer, DEFAULT_MAX_FRAME_SIZE};

/// Default writer channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a stream link.
#[derive(Debug, Clone)]
pub struct StreamLinkConfig {
    /// Capacity of the channel feeding the writer task.
    pub channel_capacity: usize,
    /// Maximum accepted inbound message size.
    pub max_frame_size: u32,
}

impl Default for StreamLinkConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Commands accepted by the writer task.
enum WriterCommand {
    /// Frame and write one wire message.
    Frame(WireMessage),
    /// Shut the write half down and exit.
    Shutdown,
}

/// Adapter that runs an [`Endpoint`] over a duplex byte stream.
pub struct StreamLink {
    endpoint: Arc<Mutex<Endpoint>>,
    config: StreamLinkConfig,
}

impl StreamLink {
    /// Create a link with the default configuration.
    pub fn new(endpoint: Arc<Mutex<Endpoint>>) -> Self {
        Self::with_config(endpoint, StreamLinkConfig::default())
    }

    /// Create a link with a custom configuration.
    pub fn with_config(endpoint: Arc<Mutex<Endpoint>>, config: StreamLinkConfig) -> Self {
        Self { endpoint, config }
    }

    /// The shared endpoint this link drives.
    pub fn endpoint(&self) -> Arc<Mutex<Endpoint>> {
        self.endpoint.clone()
    }

    /// Drive the endpoint over the stream until it closes.
    ///
    /// Installs the transport hooks, signals `connected(descriptor)`
    /// (draining anything queued while offline), then reads frames and
    /// feeds them into `receive_message`. When the stream ends - EOF, read
    /// error, or a `disconnect()` request through the installed hook - the
    /// endpoint is flipped back to disconnected and this method returns.
    ///
    /// # Errors
    ///
    /// Propagates the connect-drain outcome, read errors and framing
    /// violations. A clean EOF returns `Ok(())`.
    pub async fn run<S>(&self, stream: S, descriptor: &str) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let writer_task = spawn_writer_task(writer, rx);

        {
            let mut endpoint = self.endpoint.lock().await;

            let send_tx = tx.clone();
            endpoint.set_sender(move |wire| {
                let tx = send_tx.clone();
                async move {
                    tx.send(WriterCommand::Frame(wire))
                        .await
                        .map_err(|_| MsglinkError::ConnectionClosed)
                }
            });

            let disconnect_tx = tx.clone();
            endpoint.set_disconnector(move || {
                let tx = disconnect_tx.clone();
                async move {
                    tx.send(WriterCommand::Shutdown)
                        .await
                        .map_err(|_| MsglinkError::ConnectionClosed)
                }
            });

            if let Err(e) = endpoint.connected(Some(descriptor.to_string())).await {
                drop(endpoint);
                let _ = tx.send(WriterCommand::Shutdown).await;
                let _ = writer_task.await;
                return Err(e);
            }
        }

        let result = self
            .read_loop(reader, self.config.max_frame_size)
            .await;

        self.endpoint.lock().await.disconnected();

        // Stop the writer; the endpoint still holds a sender clone of the
        // channel, so the task only ends on an explicit shutdown.
        let _ = tx.send(WriterCommand::Shutdown).await;
        let _ = writer_task.await;

        result
    }

    /// Read frames off the stream and dispatch them into the endpoint.
    async fn read_loop<R>(&self, mut reader: R, max_frame_size: u32) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut framing = LengthDelimitedBuffer::with_max_frame(max_frame_size);
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) => return Err(MsglinkError::Io(e)),
            };

            for message in framing.push(&buf[..n])? {
                self.endpoint.lock().await.receive_message(&message).await;
            }
        }
    }
}

/// Spawn the writer task: frames wire messages onto the write half.
fn spawn_writer_task<W>(
    writer: W,
    rx: mpsc::Receiver<WriterCommand>,
) -> JoinHandle<Result<()>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = writer_loop(writer, rx).await {
            tracing::error!("Writer task error: {}", e);
            return Err(e);
        }
        Ok(())
    })
}

/// Main writer loop - receives commands and writes frames to the stream.
async fn writer_loop<W>(mut writer: W, mut rx: mpsc::Receiver<WriterCommand>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Frame(wire) => {
                let frame = encode_frame(&wire);
                writer.write_all(&frame).await?;
                writer.flush().await?;
            }
            WriterCommand::Shutdown => {
                let _ = writer.shutdown().await;
                return Ok(());
            }
        }
    }

    Ok(())
}
