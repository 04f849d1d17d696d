//! Transport layer abstraction
//!
//! A [`Transport`] only moves bytes between two endpoints. [`Message`]
//! gives those bytes their shape, and [`Exchange`] pairs each request
//! with exactly one reply.
//!
//! The protocol is strict request/response: a client never has two
//! requests in flight on one transport.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ErrorCode, ErrorReply};

pub mod message;

pub use message::Message;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection closed
    #[error("Connection closed")]
    Disconnected,

    /// Send failed
    #[error("Failed to send: {0}")]
    SendFailed(String),

    /// No reply before the deadline
    #[error("Operation timed out")]
    Timeout,

    /// Bytes did not decode to a message
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A field is longer than its length prefix allows
    #[error("Field too large to encode: {0} bytes")]
    TooLarge(usize),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Abstract transport trait
///
/// The transport is responsible only for moving bytes. Sealing is done
/// by the layers above.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send data to the peer
    async fn send(&mut self, data: &[u8]) -> TransportResult<()>;

    /// Receive data from the peer
    ///
    /// Blocks until data is available or the connection is closed.
    async fn receive(&mut self) -> TransportResult<Vec<u8>>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Close the transport
    async fn close(&mut self) -> TransportResult<()>;
}

/// In-memory transport for same-process peers and tests
pub mod memory {
    use super::*;
    use tokio::sync::mpsc;

    const CHANNEL_CAPACITY: usize = 16;

    /// Create a pair of connected in-memory transports
    pub fn create_pair() -> (MemoryTransport, MemoryTransport) {
        let (tx1, rx1) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx2, rx2) = mpsc::channel(CHANNEL_CAPACITY);

        let client = MemoryTransport {
            tx: tx1,
            rx: rx2,
            connected: true,
        };

        let server = MemoryTransport {
            tx: tx2,
            rx: rx1,
            connected: true,
        };

        (client, server)
    }

    /// In-memory transport endpoint
    pub struct MemoryTransport {
        tx: mpsc::Sender<Vec<u8>>,
        rx: mpsc::Receiver<Vec<u8>>,
        connected: bool,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&mut self, data: &[u8]) -> TransportResult<()> {
            if !self.connected {
                return Err(TransportError::Disconnected);
            }

            self.tx
                .send(data.to_vec())
                .await
                .map_err(|_| TransportError::SendFailed("Channel closed".to_string()))
        }

        async fn receive(&mut self) -> TransportResult<Vec<u8>> {
            if !self.connected {
                return Err(TransportError::Disconnected);
            }

            self.rx.recv().await.ok_or(TransportError::Disconnected)
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn close(&mut self) -> TransportResult<()> {
            self.connected = false;
            self.rx.close();
            Ok(())
        }
    }
}

/// Client end: one request, one reply, bounded by a deadline
pub struct Exchange<T: Transport> {
    transport: T,
    deadline: Duration,
}

impl<T: Transport> Exchange<T> {
    /// Wrap `transport`, waiting at most `deadline` per request
    pub fn new(transport: T, deadline: Duration) -> Self {
        Exchange {
            transport,
            deadline,
        }
    }

    /// Send `message` and wait for its reply
    ///
    /// On [`TransportError::Timeout`] the request is abandoned, not
    /// retried. A late reply may still arrive, so the caller should
    /// start over on a fresh transport.
    pub async fn request(&mut self, message: &Message) -> TransportResult<Message> {
        let bytes = message.to_bytes()?;
        let transport = &mut self.transport;

        debug!(kind = message.kind(), len = bytes.len(), "request");
        let reply = tokio::time::timeout(self.deadline, async move {
            transport.send(&bytes).await?;
            transport.receive().await
        })
        .await
        .map_err(|_| TransportError::Timeout)??;

        Message::from_bytes(&reply)
    }

    /// Close the underlying transport
    pub async fn close(&mut self) -> TransportResult<()> {
        self.transport.close().await
    }
}

/// Something that answers one message with another
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Produce the reply to `message`
    async fn handle(&self, message: Message) -> Message;
}

/// Answer requests on `transport` until the peer disconnects
///
/// Bytes that do not decode are answered with a `malformed_request`
/// error instead of ending the loop.
pub async fn serve<T, H>(mut transport: T, handler: &H) -> TransportResult<()>
where
    T: Transport,
    H: MessageHandler + ?Sized,
{
    loop {
        let bytes = match transport.receive().await {
            Ok(bytes) => bytes,
            Err(TransportError::Disconnected) => {
                debug!("peer disconnected");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let reply = match Message::from_bytes(&bytes) {
            Ok(message) => handler.handle(message).await,
            Err(e) => {
                warn!(error = %e, "undecodable request");
                Message::Error(ErrorReply::new(ErrorCode::MalformedRequest, e.to_string()))
            }
        };

        let bytes = match reply.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, kind = reply.kind(), "reply does not encode");
                let fallback = ErrorReply::new(ErrorCode::Internal, "reply too large");
                Message::Error(fallback).to_bytes()?
            }
        };
        transport.send(&bytes).await?;
    }
}
