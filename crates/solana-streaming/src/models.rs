//! Notification payloads.
//!
//! Account keys are base58 strings. Token amounts, supplies and prices are
//! kept as the strings the service sends so no precision is lost.

use serde::{Deserialize, Serialize};

/// A block processed by the service.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockNotification {
    /// Block height.
    pub block: u64,
    /// Unix timestamp of the block.
    pub block_time: u64,
}

/// A newly created trading pair.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPairNotification {
    /// Slot the pair was created in.
    pub slot: u64,
    /// Signature of the creating transaction.
    pub signature: String,
    /// Unix timestamp of the block.
    pub block_time: u64,
    /// The pair itself.
    pub pair: Pair,
}

/// A swap executed on a tracked exchange.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapNotification {
    /// Slot the swap landed in.
    pub slot: u64,
    /// Signature of the swap transaction.
    pub signature: String,
    /// Unix timestamp of the block.
    pub block_time: u64,
    /// The swap itself.
    pub swap: Swap,
}

/// A liquidity pair.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    /// Exchange where the pair is listed.
    pub source_exchange: String,
    /// AMM account of the pair, or the bonding curve for launch platforms.
    pub amm_account: String,
    /// Base token of the pair.
    pub base_token: Token,
    /// Quote token of the pair, usually wrapped SOL.
    pub quote_token: Token,
    /// Base token added to the pool.
    pub base_token_liquidity_added: String,
    /// Quote token added to the pool.
    pub quote_token_liquidity_added: String,
    /// Source exchange of the launch migration that produced this pair, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<String>,
}

/// A token in a pair.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Token {
    /// Mint address.
    pub account: String,
    /// Additional token information.
    #[serde(default)]
    pub info: Option<TokenInfo>,
}

/// Mint information for a token.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    /// Decimal places.
    pub decimals: u32,
    /// Total supply.
    pub supply: String,
    /// Name, symbol and links.
    #[serde(default)]
    pub metadata: Option<TokenMetadata>,
    /// Authority allowed to mint, `None` for fixed-supply tokens.
    #[serde(default)]
    pub mint_authority: Option<String>,
    /// Authority allowed to freeze accounts, `None` if nobody can.
    #[serde(default)]
    pub freeze_authority: Option<String>,
}

/// Token metadata.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    /// Token name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Logo URL.
    pub logo: String,
    /// Social links.
    #[serde(default)]
    pub socials: TokenSocials,
}

/// Social links of a token.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct TokenSocials {
    /// Website URL.
    #[serde(default)]
    pub website: String,
    /// X profile.
    #[serde(default)]
    pub x: String,
    /// Telegram link.
    #[serde(default)]
    pub telegram: String,
}

/// A single swap.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Swap {
    /// Exchange the swap happened on.
    pub source_exchange: String,
    /// Pair address, or the bonding curve for launch platform swaps.
    pub amm_account: String,
    /// Token being traded.
    pub base_token_mint: String,
    /// Token the price is quoted in, usually wrapped SOL.
    pub quote_token_mint: String,
    /// Wallet on the other side of the pool.
    pub wallet_account: String,
    /// Execution price: quote amount divided by base amount.
    #[serde(default)]
    pub quote_price: Option<String>,
    /// Value of the swap in USD.
    #[serde(default)]
    pub usd_value: f64,
    /// Base token amount traded.
    pub base_amount: String,
    /// `buy` or `sell`.
    pub swap_type: String,
    /// Quote token in the pool. Not always available; may be empty.
    #[serde(default)]
    pub quote_token_liquidity: String,
}
