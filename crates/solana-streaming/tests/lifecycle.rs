//! Connect, close and reconnect.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use solana_streaming::{CancellationToken, Client, Error, MemoryTransport, TerminalError};

use common::{API_KEY, acknowledge, answer, connect};

#[tokio::test]
async fn test_second_connect_is_rejected_while_live() {
    let (client, _peer) = connect().await;

    assert!(matches!(client.connect().await, Err(Error::AlreadyConnected)));
    assert!(!client.is_terminated());
}

#[tokio::test]
async fn test_close_terminates_and_notifies_peer() {
    let (client, peer) = connect().await;

    client.close().await.unwrap();

    assert_eq!(client.terminal_error(), Some(TerminalError::Closed));
    assert!(peer.recv().await.is_none());
    assert!(matches!(
        client
            .call::<Value>("ping", None, &CancellationToken::new())
            .await,
        Err(Error::ConnectionLost(TerminalError::Closed))
    ));
}

#[tokio::test]
async fn test_close_unblocks_pending_receive() {
    let (client, peer) = connect().await;
    let cancel = CancellationToken::new();

    let remote = peer.clone();
    tokio::spawn(async move { acknowledge(&remote, "swapSubscribe", 8).await });
    let mut swaps = client.subscribe_swaps(None, &cancel).await.unwrap();

    let receive = tokio::spawn(async move { swaps.receive(&CancellationToken::new()).await });
    tokio::task::yield_now().await;
    client.close().await.unwrap();

    assert!(matches!(
        receive.await.unwrap(),
        Err(Error::ConnectionLost(TerminalError::Closed))
    ));
}

#[tokio::test]
async fn test_reconnect_after_connection_lost() {
    let _ = tracing_subscriber::fmt::try_init();

    let (transport, server) = MemoryTransport::new();
    let client = Client::builder()
        .api_key(API_KEY)
        .endpoint("ws://memory.test")
        .transport(transport)
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    client.connect().await.unwrap();
    let first = server.accept().await.unwrap();
    first.disconnect("reset");
    common::eventually(|| client.is_terminated()).await;

    client.connect().await.unwrap();
    let second = server.accept().await.unwrap();
    assert!(!client.is_terminated());

    tokio::spawn(async move { answer(&second, "ping", json!("pong")).await });
    let pong: String = client.call("ping", None, &cancel).await.unwrap();
    assert_eq!(pong, "pong");
}

#[tokio::test]
async fn test_operations_before_connect() {
    let (transport, _server) = MemoryTransport::new();
    let client = Client::builder()
        .api_key(API_KEY)
        .transport(transport)
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    assert!(matches!(
        client.call::<Value>("ping", None, &cancel).await,
        Err(Error::NotConnected)
    ));
    assert!(matches!(
        client.subscribe_latest_block(None, &cancel).await,
        Err(Error::NotConnected)
    ));
    assert!(client.terminal_error().is_none());
    assert_eq!(client.registered_receivers(), 0);
}

#[tokio::test]
async fn test_rate_limited_handshake() {
    let client = Client::builder()
        .api_key(API_KEY)
        .transport(MemoryTransport::rate_limited("too many connections"))
        .build()
        .unwrap();

    let result = client.connect().await;

    assert!(matches!(
        result,
        Err(Error::RateLimitExceeded(ref reason)) if reason == "too many connections"
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_connects_dial_once() {
    let _ = tracing_subscriber::fmt::try_init();

    let (transport, server) = MemoryTransport::new();
    let client = Arc::new(
        Client::builder()
            .api_key(API_KEY)
            .endpoint("ws://memory.test")
            .transport(transport)
            .build()
            .unwrap(),
    );

    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.connect().await }
    });
    let second = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.connect().await }
    });
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|result| matches!(result, Err(Error::AlreadyConnected)))
    );

    let peer = server.accept().await.unwrap();
    assert!(
        tokio::time::timeout(Duration::from_millis(50), server.accept())
            .await
            .is_err()
    );

    // The surviving connection is the one that was dialed.
    tokio::spawn(async move { answer(&peer, "ping", json!("pong")).await });
    let pong: String = client
        .call("ping", None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(pong, "pong");
}
