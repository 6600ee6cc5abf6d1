//! Subscription topics offered by the service.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{LatestBlockNotification, NewPairNotification, SwapNotification};
use crate::subscription::Subscription;

/// A subscription topic: its wire method names and payload types.
pub trait Topic {
    /// Method that opens the subscription.
    const SUBSCRIBE: &'static str;

    /// Method that closes the subscription.
    const UNSUBSCRIBE: &'static str;

    /// Parameters accepted on subscribe and by
    /// [`Subscription::update_params`].
    type Params: Serialize + Send + Sync;

    /// Payload of each notification.
    type Notification: DeserializeOwned;
}

/// New trading pairs.
#[derive(Debug, Clone, Copy)]
pub struct NewPairs;

impl Topic for NewPairs {
    const SUBSCRIBE: &'static str = "newPairSubscribe";
    const UNSUBSCRIBE: &'static str = "newPairUnsubscribe";
    type Params = NewPairSubscribeParams;
    type Notification = NewPairNotification;
}

/// Swaps on tracked exchanges.
#[derive(Debug, Clone, Copy)]
pub struct Swaps;

impl Topic for Swaps {
    const SUBSCRIBE: &'static str = "swapSubscribe";
    const UNSUBSCRIBE: &'static str = "swapUnsubscribe";
    type Params = SwapSubscribeParams;
    type Notification = SwapNotification;
}

/// Latest processed block.
#[derive(Debug, Clone, Copy)]
pub struct LatestBlock;

impl Topic for LatestBlock {
    const SUBSCRIBE: &'static str = "latestBlockSubscribe";
    const UNSUBSCRIBE: &'static str = "latestBlockUnsubscribe";
    // The service accepts the same parameter object as new pairs here.
    type Params = NewPairSubscribeParams;
    type Notification = LatestBlockNotification;
}

/// Handle for the [`NewPairs`] topic.
pub type NewPairsSubscription = Subscription<NewPairNotification, NewPairSubscribeParams>;

/// Handle for the [`Swaps`] topic.
pub type SwapsSubscription = Subscription<SwapNotification, SwapSubscribeParams>;

/// Handle for the [`LatestBlock`] topic.
pub type LatestBlockSubscription = Subscription<LatestBlockNotification, NewPairSubscribeParams>;

/// Parameters for new pair subscriptions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NewPairSubscribeParams {
    /// Include launchpad tokens such as pumpfun and raydium launchlab.
    pub include_launchpad_tokens: bool,

    /// Legacy flag. Use `include_launchpad_tokens` instead.
    pub include_pumpfun: bool,
}

/// Parameters for swap subscriptions.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SwapSubscribeParams {
    /// Filters a swap must match.
    pub include: SwapFilter,
}

/// Swap filters. Empty fields do not filter.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SwapFilter {
    /// AMM accounts to include.
    #[serde(rename = "AmmAccount", skip_serializing_if = "Vec::is_empty")]
    pub amm_account: Vec<String>,

    /// Wallets to include.
    #[serde(rename = "WalletAccount", skip_serializing_if = "Vec::is_empty")]
    pub wallet_account: Vec<String>,

    /// Base token mints to include.
    #[serde(rename = "BaseTokenMint", skip_serializing_if = "Vec::is_empty")]
    pub base_token_mint: Vec<String>,

    /// Minimum USD value of a swap.
    #[serde(rename = "USDValue", skip_serializing_if = "Option::is_none")]
    pub usd_value: Option<f64>,
}
