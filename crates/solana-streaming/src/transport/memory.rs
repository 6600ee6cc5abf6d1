//! In-memory transport for testing.
//!
//! [`MemoryTransport::new`] returns the dialing half together with a
//! [`MemoryServer`]; every successful dial surfaces on the server as a
//! [`MemoryPeer`] that plays the remote side of the connection.

use std::io;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{Credentials, FrameReader, FrameWriter, Transport, TransportError};
use crate::envelope::{self, Envelope, RequestId, SubscriptionId};

type Outbound = Result<String, String>;

/// Dialing half of the in-memory transport.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    incoming: flume::Sender<MemoryPeer>,
    rate_limited: Option<String>,
}

/// Accepting half of the in-memory transport.
#[derive(Debug)]
pub struct MemoryServer {
    incoming: flume::Receiver<MemoryPeer>,
}

impl MemoryTransport {
    /// Create a connected transport/server pair.
    #[must_use]
    pub fn new() -> (Self, MemoryServer) {
        let (incoming_tx, incoming_rx) = flume::unbounded();
        (
            Self {
                incoming: incoming_tx,
                rate_limited: None,
            },
            MemoryServer {
                incoming: incoming_rx,
            },
        )
    }

    /// Create a transport whose handshakes are always refused as rate limited.
    #[must_use]
    pub fn rate_limited(reason: impl Into<String>) -> Self {
        let (transport, _server) = Self::new();
        Self {
            rate_limited: Some(reason.into()),
            ..transport
        }
    }
}

impl MemoryServer {
    /// Wait for the next dialed connection. Returns `None` once every
    /// transport handle is gone.
    pub async fn accept(&self) -> Option<MemoryPeer> {
        self.incoming.recv_async().await.ok()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
    ) -> Result<(Box<dyn FrameWriter>, Box<dyn FrameReader>), TransportError> {
        if let Some(reason) = &self.rate_limited {
            return Err(TransportError::RateLimited(reason.clone()));
        }

        let (client_to_server_tx, client_to_server_rx) = flume::unbounded();
        let (server_to_client_tx, server_to_client_rx) = flume::unbounded();

        let peer = MemoryPeer {
            endpoint: endpoint.clone(),
            credentials: credentials.clone(),
            inbound: client_to_server_rx,
            outbound: server_to_client_tx,
        };
        self.incoming
            .send_async(peer)
            .await
            .map_err(|_| TransportError::ConnectionFailed("server gone".to_string()))?;

        debug!("Memory connection established to {}", endpoint);

        Ok((
            Box::new(MemoryWriter {
                sender: Some(client_to_server_tx),
            }),
            Box::new(MemoryReader {
                receiver: server_to_client_rx,
            }),
        ))
    }
}

/// Remote side of an in-memory connection.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    endpoint: Url,
    credentials: Credentials,
    inbound: flume::Receiver<String>,
    outbound: flume::Sender<Outbound>,
}

impl MemoryPeer {
    /// Endpoint the client dialed.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Credentials the client presented.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Next frame written by the client, or `None` once it closed.
    pub async fn recv(&self) -> Option<String> {
        self.inbound.recv_async().await.ok()
    }

    /// Next frame written by the client, parsed as an envelope.
    pub async fn recv_envelope(&self) -> Option<Envelope> {
        let frame = self.recv().await?;
        envelope::decode(&frame).ok()
    }

    /// Push a raw frame to the client. Returns `false` if the client is gone.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.outbound.send(Ok(frame.into())).is_ok()
    }

    /// Push a JSON value as a frame.
    pub fn send_json(&self, value: &Value) -> bool {
        self.send(value.to_string())
    }

    /// Answer request `id` with `result`.
    pub fn reply(&self, id: RequestId, result: Value) -> bool {
        self.send_json(&serde_json::json!({ "id": id, "result": result }))
    }

    /// Answer request `id` with an error.
    pub fn reply_error(&self, id: RequestId, code: i64, message: &str) -> bool {
        self.send_json(&serde_json::json!({
            "id": id,
            "error": { "code": code, "message": message },
        }))
    }

    /// Push a notification for `subscription_id`.
    pub fn notify(&self, subscription_id: SubscriptionId, method: &str, params: Value) -> bool {
        self.send_json(&serde_json::json!({
            "subscription_id": subscription_id,
            "method": method,
            "params": params,
        }))
    }

    /// Make the client's next read fail.
    pub fn disconnect(&self, reason: impl Into<String>) {
        let _ = self.outbound.send(Err(reason.into()));
    }
}

struct MemoryWriter {
    sender: Option<flume::Sender<String>>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn write_frame(&mut self, frame: String) -> Result<(), TransportError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;
        sender
            .send_async(frame)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sender = None;
        Ok(())
    }
}

struct MemoryReader {
    receiver: flume::Receiver<Outbound>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<String, TransportError> {
        match self.receiver.recv_async().await {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(reason)) => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                reason,
            ))),
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }
}
