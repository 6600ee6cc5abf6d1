//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::{Value, json};
use solana_streaming::{Client, ClientBuilder, Envelope, MemoryTransport, transport::MemoryPeer};

pub const API_KEY: &str = "test-key";

/// Connect a client built from `builder` to a fresh in-memory peer.
pub async fn connect_with(builder: ClientBuilder) -> (Client, MemoryPeer) {
    let _ = tracing_subscriber::fmt::try_init();

    let (transport, server) = MemoryTransport::new();
    let client = builder
        .api_key(API_KEY)
        .endpoint("ws://memory.test")
        .transport(transport)
        .build()
        .unwrap();

    let accept = tokio::spawn(async move { server.accept().await.unwrap() });
    client.connect().await.unwrap();
    let peer = accept.await.unwrap();

    (client, peer)
}

/// Connect a client with default settings.
pub async fn connect() -> (Client, MemoryPeer) {
    connect_with(Client::builder()).await
}

/// Wait for the next request, check its method, and answer it with `result`.
pub async fn answer(peer: &MemoryPeer, method: &str, result: Value) -> Envelope {
    let request = peer.recv_envelope().await.unwrap();
    assert_eq!(request.method, method);
    assert!(peer.reply(request.id, result));
    request
}

/// Answer a subscribe request with `subscription_id`.
pub async fn acknowledge(peer: &MemoryPeer, method: &str, subscription_id: u64) -> Envelope {
    answer(
        peer,
        method,
        json!({ "message": "subscribed", "subscription_id": subscription_id }),
    )
    .await
}

/// A swap notification payload for `slot`.
pub fn swap(slot: u64) -> Value {
    json!({
        "slot": slot,
        "signature": format!("sig{slot}"),
        "blockTime": 1_700_000_000,
        "swap": {
            "sourceExchange": "raydium",
            "ammAccount": "Amm111",
            "baseTokenMint": "Base111",
            "quoteTokenMint": "So11111111111111111111111111111111111111112",
            "walletAccount": "Wallet111",
            "quotePrice": "0.5",
            "usdValue": 10.0,
            "baseAmount": "20",
            "swapType": "sell",
            "quoteTokenLiquidity": "1000"
        }
    })
}

/// Poll `condition` until it holds, failing the test after one second.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
