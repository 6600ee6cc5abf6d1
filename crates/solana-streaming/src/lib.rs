//! Client for the Solana Streaming service.
//!
//! One duplex WebSocket connection carries both request/response calls and
//! any number of subscriptions. Calls are correlated by a client-chosen
//! request id; subscriptions by the id the service assigns when it
//! acknowledges them. A single reader task routes every inbound message.
//!
//! # Features
//!
//! - **Multiplexing**: Concurrent calls and subscriptions over one connection
//! - **Typed Topics**: New pairs, swaps and latest blocks decode into models
//! - **Cancellation**: Every wait accepts a `CancellationToken`
//! - **Fail Fast**: Once the connection dies every waiter observes why
//!
//! # Example
//!
//! ```no_run
//! use solana_streaming::{CancellationToken, Client, SwapSubscribeParams};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("api-key")?;
//!     client.connect().await?;
//!
//!     let cancel = CancellationToken::new();
//!     let mut swaps = client
//!         .subscribe_swaps(Some(&SwapSubscribeParams::default()), &cancel)
//!         .await?;
//!
//!     let notification = swaps.receive(&cancel).await?;
//!     println!("swap in slot {}", notification.slot);
//!
//!     swaps.unsubscribe(&cancel).await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
mod connection;
mod dispatch;
pub mod envelope;
pub mod error;
pub mod models;
mod registry;
pub mod subscription;
pub mod topics;
pub mod transport;

// Re-export commonly used types
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use connection::MAX_REQUEST_ID;
pub use envelope::{Envelope, ErrorObject, RequestId, SubscriptionId};
pub use error::{DecodeError, Error, Result, TerminalError};
pub use models::{
    LatestBlockNotification, NewPairNotification, Pair, Swap, SwapNotification, Token, TokenInfo,
    TokenMetadata, TokenSocials,
};
pub use registry::{GlobalErrorPolicy, ReceiverKey};
pub use subscription::{Subscription, SubscriptionState, UpdateParamsMode};
pub use topics::{
    LatestBlock, LatestBlockSubscription, NewPairSubscribeParams, NewPairs, NewPairsSubscription,
    SwapFilter, SwapSubscribeParams, Swaps, SwapsSubscription, Topic,
};
pub use transport::{Credentials, MemoryTransport, Transport, TransportError, WebSocketTransport};

// Re-export dependencies that are part of our public API
pub use tokio_util::sync::CancellationToken;
