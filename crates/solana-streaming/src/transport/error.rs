//! Transport error types.

use thiserror::Error;

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The handshake was refused because of rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection is closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The endpoint is not usable by this transport.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
