//! Request/response correlation over a shared connection.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use solana_streaming::{CancellationToken, Client, Error, MAX_REQUEST_ID, TerminalError};

use common::{API_KEY, answer, connect, connect_with, eventually};

#[tokio::test]
async fn test_handshake_presents_credentials() {
    let (client, peer) = connect().await;

    assert_eq!(peer.credentials().api_key, API_KEY);
    assert_eq!(peer.endpoint().as_str(), "ws://memory.test/");
    assert!(!client.is_terminated());
}

#[tokio::test]
async fn test_call_decodes_typed_result() {
    let (client, peer) = connect().await;

    let remote = tokio::spawn(async move {
        let request = answer(&peer, "getVersion", json!({ "version": "1.2.3" })).await;
        assert!((1..=MAX_REQUEST_ID).contains(&request.id));
        assert!(request.params.is_none());
    });

    let result: Value = client
        .call("getVersion", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result, json!({ "version": "1.2.3" }));
    assert_eq!(client.registered_receivers(), 0);
    remote.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_receive_their_own_replies() {
    const CALLS: u64 = 32;

    let (client, peer) = connect().await;
    let client = Arc::new(client);

    let remote = tokio::spawn(async move {
        let mut requests = Vec::new();
        for _ in 0..CALLS {
            requests.push(peer.recv_envelope().await.unwrap());
        }

        let mut ids: Vec<i64> = requests.iter().map(|request| request.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), requests.len(), "request ids must be unique");

        // Answer in reverse arrival order.
        for request in requests.into_iter().rev() {
            let n = request.params.as_ref().unwrap()["n"].clone();
            assert!(peer.reply(request.id, json!({ "n": n })));
        }
    });

    let mut calls = Vec::new();
    for n in 0..CALLS {
        let client = Arc::clone(&client);
        calls.push(tokio::spawn(async move {
            let result: Value = client
                .call("echo", Some(json!({ "n": n })), &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(result, json!({ "n": n }));
        }));
    }

    for call in calls {
        call.await.unwrap();
    }
    remote.await.unwrap();
    assert_eq!(client.registered_receivers(), 0);
}

#[tokio::test]
async fn test_remote_error_fails_only_that_call() {
    let (client, peer) = connect().await;

    tokio::spawn(async move {
        let request = peer.recv_envelope().await.unwrap();
        peer.reply_error(request.id, -32601, "method not found");
        answer(&peer, "ping", json!("pong")).await;
    });

    let cancel = CancellationToken::new();
    let result = client.call::<Value>("bogus", None, &cancel).await;
    assert!(matches!(
        result,
        Err(Error::Remote { code: -32601, ref message }) if message == "method not found"
    ));

    let pong: String = client.call("ping", None, &cancel).await.unwrap();
    assert_eq!(pong, "pong");
    assert!(!client.is_terminated());
}

#[tokio::test]
async fn test_zero_error_code_is_success() {
    let (client, peer) = connect().await;

    tokio::spawn(async move {
        let request = peer.recv_envelope().await.unwrap();
        peer.send_json(&json!({
            "id": request.id,
            "result": { "ok": true },
            "error": { "code": 0, "message": "" },
        }));
    });

    let result: Value = client
        .call("ping", None, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result, json!({ "ok": true }));
}

#[tokio::test(start_paused = true)]
async fn test_call_times_out() {
    let (client, peer) = connect_with(
        Client::builder().request_timeout(Duration::from_millis(250)),
    )
    .await;

    let result = client
        .call::<Value>("slow", None, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Timeout(timeout)) if timeout == Duration::from_millis(250)));
    assert_eq!(client.registered_receivers(), 0);

    // A reply arriving after the timeout is dropped without harm.
    let request = peer.recv_envelope().await.unwrap();
    assert!(peer.reply(request.id, json!("late")));
    assert!(!client.is_terminated());
}

#[tokio::test]
async fn test_cancelled_call_unregisters() {
    let (client, peer) = connect().await;
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        // Only cancel once the request is on the wire.
        peer.recv_envelope().await.unwrap();
        canceller.cancel();
    });

    let result = client.call::<Value>("slow", None, &cancel).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(client.registered_receivers(), 0);
    assert!(!client.is_terminated());
}

#[tokio::test]
async fn test_read_failure_fails_pending_and_later_calls() {
    let (client, peer) = connect().await;

    tokio::spawn(async move {
        peer.recv_envelope().await.unwrap();
        peer.disconnect("connection reset by peer");
    });

    let cancel = CancellationToken::new();
    let result = client.call::<Value>("slow", None, &cancel).await;
    assert!(matches!(
        result,
        Err(Error::ConnectionLost(TerminalError::ReadFailed(_)))
    ));

    let result = client.call::<Value>("ping", None, &cancel).await;
    assert!(matches!(
        result,
        Err(Error::ConnectionLost(TerminalError::ReadFailed(_)))
    ));
    assert!(result.unwrap_err().is_terminal());
}

#[tokio::test]
async fn test_global_error_reaches_pending_call_and_terminates() {
    let (client, peer) = connect().await;

    tokio::spawn(async move {
        peer.recv_envelope().await.unwrap();
        peer.send(r#"{"id":0,"error":{"code":1001,"message":"server shutting down"}}"#);
    });

    let cancel = CancellationToken::new();
    let result = client.call::<Value>("slow", None, &cancel).await;
    assert!(matches!(
        result,
        Err(Error::Remote { code: 1001, ref message }) if message == "server shutting down"
    ));

    eventually(|| client.is_terminated()).await;
    assert_eq!(
        client.terminal_error(),
        Some(TerminalError::RemoteFault {
            code: 1001,
            message: "server shutting down".to_string()
        })
    );
    assert!(matches!(
        client.call::<Value>("ping", None, &cancel).await,
        Err(Error::ConnectionLost(TerminalError::RemoteFault { code: 1001, .. }))
    ));
}

#[tokio::test]
async fn test_global_error_stops_reading() {
    let (client, peer) = connect().await;
    let client = Arc::new(client);
    let cancel = CancellationToken::new();

    let remote = peer.clone();
    tokio::spawn(async move { common::acknowledge(&remote, "swapSubscribe", 50).await });
    let _swaps = client.subscribe_swaps(None, &cancel).await.unwrap();

    let caller = Arc::clone(&client);
    let pending = tokio::spawn(async move {
        caller
            .call::<Value>("slow", None, &CancellationToken::new())
            .await
    });
    assert_eq!(peer.recv_envelope().await.unwrap().method, "slow");

    peer.send(r#"{"id":0,"error":{"code":1001,"message":"fatal"}}"#);

    // Either the call got the error itself or it went to the subscription.
    let result = pending.await.unwrap();
    assert!(matches!(
        result,
        Err(Error::Remote { code: 1001, .. }
            | Error::ConnectionLost(TerminalError::RemoteFault { code: 1001, .. }))
    ));

    // The reader is gone once the loop stops.
    eventually(|| !peer.send("{}")).await;
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let (client, peer) = connect().await;

    tokio::spawn(async move {
        let request = peer.recv_envelope().await.unwrap();
        peer.send("not json at all");
        peer.send(r#"{"id":"#);
        peer.reply(request.id, json!(1));
    });

    let result: u64 = client
        .call("ping", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result, 1);
    assert!(!client.is_terminated());
}

#[tokio::test]
async fn test_missing_result_is_a_decode_error() {
    let (client, peer) = connect().await;

    tokio::spawn(async move {
        let request = peer.recv_envelope().await.unwrap();
        peer.send_json(&json!({ "id": request.id }));
    });

    let result = client
        .call::<Value>("ping", None, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Decoding(_))));
}
