//! Wire transport abstraction.
//!
//! A transport dials an endpoint and hands back the two halves of a duplex
//! text-message stream. The dispatch loop owns the reader; the writer sits
//! behind the connection's write lock.
//!
//! Implementations:
//! - [`WebSocketTransport`] for the real service
//! - [`MemoryTransport`] for in-process testing

pub mod error;
pub mod memory;
pub mod ws;

use std::fmt;

use async_trait::async_trait;
use url::Url;

pub use error::TransportError;
pub use memory::{MemoryPeer, MemoryServer, MemoryTransport};
pub use ws::WebSocketTransport;

/// Credentials presented when dialing.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// API key sent during the handshake.
    pub api_key: String,
}

impl Credentials {
    /// Create credentials from an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Dials endpoints.
#[async_trait]
pub trait Transport: fmt::Debug + Send + Sync + 'static {
    /// Open a connection to `endpoint`.
    ///
    /// A handshake refused for rate limiting must be reported as
    /// [`TransportError::RateLimited`].
    async fn connect(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
    ) -> Result<(Box<dyn FrameWriter>, Box<dyn FrameReader>), TransportError>;
}

/// Read half of a connection.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Wait for the next text frame. Any error is terminal.
    async fn read_frame(&mut self) -> Result<String, TransportError>;
}

/// Write half of a connection.
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Write one text frame.
    async fn write_frame(&mut self, frame: String) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}
