//! CLI binary that streams notifications from the Solana Streaming service.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use solana_streaming::config::{DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT};
use solana_streaming::{
    CancellationToken, Client, NewPairSubscribeParams, Subscription, SwapFilter,
    SwapSubscribeParams,
};
use tracing::{error, info, warn};

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Streaming client error
    #[error(transparent)]
    Client(#[from] solana_streaming::Error),

    /// Notification could not be printed
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// API key for the service
    #[arg(long, env = "SOLANA_STREAMING_API_KEY", hide_env_values = true)]
    api_key: String,

    /// WebSocket endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT, env = "SOLANA_STREAMING_ENDPOINT")]
    endpoint: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = default_request_timeout_ms())]
    request_timeout_ms: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    topic: TopicCommand,
}

#[derive(Clone, Debug, Subcommand)]
enum TopicCommand {
    /// Stream newly created trading pairs
    NewPairs {
        /// Include launchpad tokens such as pumpfun
        #[arg(long)]
        include_launchpad_tokens: bool,
    },

    /// Stream swaps
    Swaps {
        /// Only swaps on these AMM accounts
        #[arg(long = "amm-account")]
        amm_accounts: Vec<String>,

        /// Only swaps by these wallets
        #[arg(long = "wallet-account")]
        wallet_accounts: Vec<String>,

        /// Only swaps of these base token mints
        #[arg(long = "base-token-mint")]
        base_token_mints: Vec<String>,

        /// Only swaps worth at least this many USD
        #[arg(long)]
        usd_value: Option<f64>,
    },

    /// Stream the latest processed block
    LatestBlock,
}

fn default_request_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_REQUEST_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let client = Client::builder()
        .api_key(args.api_key)
        .endpoint(args.endpoint)
        .request_timeout(Duration::from_millis(args.request_timeout_ms))
        .build()?;
    client.connect().await?;

    let shutdown_token = CancellationToken::new();
    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received interrupt signal");
        signal_shutdown_token.cancel();
    });

    let result = match args.topic {
        TopicCommand::NewPairs {
            include_launchpad_tokens,
        } => {
            let params = NewPairSubscribeParams {
                include_launchpad_tokens,
                ..NewPairSubscribeParams::default()
            };
            let subscription = client
                .subscribe_new_pairs(Some(&params), &shutdown_token)
                .await?;
            stream(subscription, &shutdown_token).await
        }
        TopicCommand::Swaps {
            amm_accounts,
            wallet_accounts,
            base_token_mints,
            usd_value,
        } => {
            let params = SwapSubscribeParams {
                include: SwapFilter {
                    amm_account: amm_accounts,
                    wallet_account: wallet_accounts,
                    base_token_mint: base_token_mints,
                    usd_value,
                },
            };
            let subscription = client
                .subscribe_swaps(Some(&params), &shutdown_token)
                .await?;
            stream(subscription, &shutdown_token).await
        }
        TopicCommand::LatestBlock => {
            let subscription = client
                .subscribe_latest_block(None, &shutdown_token)
                .await?;
            stream(subscription, &shutdown_token).await
        }
    };

    if let Err(e) = client.close().await {
        warn!("Close failed: {}", e);
    }
    info!("Shutting down");

    result
}

/// Print notifications until interrupted, then unsubscribe.
async fn stream<N, P>(
    mut subscription: Subscription<N, P>,
    shutdown_token: &CancellationToken,
) -> Result<(), Error>
where
    N: DeserializeOwned + Serialize,
    P: Serialize,
{
    info!("Streaming subscription {}", subscription.id());

    loop {
        match subscription.receive(shutdown_token).await {
            Ok(notification) => println!("{}", serde_json::to_string(&notification)?),
            Err(solana_streaming::Error::Cancelled) => break,
            Err(solana_streaming::Error::Decoding(e)) => {
                warn!("Skipping notification: {}", e);
            }
            Err(e) => {
                error!("Stream ended: {}", e);
                return Err(e.into());
            }
        }
    }

    // The shutdown token has fired; the request timeout bounds this call.
    // Notifications still arriving are drained while it is in flight.
    subscription.unsubscribe(&CancellationToken::new()).await?;
    Ok(())
}
