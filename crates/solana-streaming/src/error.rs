//! Error types for the streaming client.

use std::time::Duration;

use thiserror::Error;

use crate::registry::ReceiverKey;
use crate::transport::TransportError;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The client was built with an unusable configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The endpoint rejected the handshake because too many connections or
    /// requests were made with this credential.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Failed to establish the connection.
    #[error("failed to connect: {0}")]
    Connect(#[source] TransportError),

    /// An operation needed a connection before `connect` was called.
    #[error("connect first")]
    NotConnected,

    /// `connect` was called while a live connection already exists.
    #[error("already connected")]
    AlreadyConnected,

    /// Caller supplied parameters could not be serialized.
    #[error("failed to encode request: {0}")]
    Encoding(#[source] serde_json::Error),

    /// A payload could not be decoded into the expected shape.
    #[error("failed to decode: {0}")]
    Decoding(#[from] DecodeError),

    /// Writing a frame to the transport failed.
    #[error("failed to write frame: {0}")]
    Write(#[source] TransportError),

    /// The connection is permanently unusable.
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] TerminalError),

    /// The remote side rejected the request.
    #[error("remote error {code}: {message}")]
    Remote {
        /// Error code reported by the remote side.
        code: i64,
        /// Human-readable message reported by the remote side.
        message: String,
    },

    /// No reply arrived within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The handle no longer refers to a live subscription.
    #[error("no subscription")]
    NoSubscription,

    /// The subscription was closed by unsubscribe or a parameter update.
    #[error("subscription closed")]
    SubscriptionClosed,

    /// A receiver is already registered under this key.
    #[error("receiver already registered for {0}")]
    DuplicateReceiver(ReceiverKey),
}

/// Decoding failures for inbound payloads.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload was present but malformed.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope did not carry the expected payload.
    #[error("envelope has no {0} payload")]
    MissingPayload(&'static str),
}

/// Why a connection stopped being usable.
///
/// Set at most once per connection and handed out by value to every waiter
/// that observes it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TerminalError {
    /// Reading from the transport failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// The remote side reported an error not bound to any request.
    #[error("remote fault {code}: {message}")]
    RemoteFault {
        /// Error code reported by the remote side.
        code: i64,
        /// Human-readable message reported by the remote side.
        message: String,
    },

    /// The connection was closed locally.
    #[error("connection closed")]
    Closed,
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::RateLimited(reason) => Self::RateLimitExceeded(reason),
            other => Self::Connect(other),
        }
    }
}

impl Error {
    /// Whether this error means the connection will never answer again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_distinguished() {
        let err = Error::from(TransportError::RateLimited("slow down".to_string()));
        assert!(matches!(err, Error::RateLimitExceeded(reason) if reason == "slow down"));

        let err = Error::from(TransportError::ConnectionFailed("refused".to_string()));
        assert!(matches!(err, Error::Connect(_)));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(Error::ConnectionLost(TerminalError::Closed).is_terminal());
        assert!(!Error::Timeout(Duration::from_secs(5)).is_terminal());
        assert!(
            !Error::Remote {
                code: 1,
                message: "bad".to_string()
            }
            .is_terminal()
        );
    }
}
