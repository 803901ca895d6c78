use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use adapters::feed::{Backoff, WsSpotFeed};
use engine::feed::{FeedEvent, SpotFeed};

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(rx: &mut mpsc::Receiver<FeedEvent>) -> FeedEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for feed event")
        .expect("feed channel closed")
}

#[tokio::test]
async fn subscribes_forwards_frames_and_reports_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let subscribe = match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => serde_json::from_str::<Value>(text.as_str()).unwrap(),
            other => panic!("expected subscribe text frame, got {other:?}"),
        };

        ws.send(Message::Text(
            r#"{"sc":"K1ABC","rc":"DL1ABC","md":"FT8","rp":-10,"t":1700000000}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text("not json".into())).await.unwrap();
        ws.close(None).await.unwrap();
        subscribe
    });

    let topics = vec!["pskr/filter/v2/20m/FT8/+/DL1ABC/#".to_string()];
    let feed = WsSpotFeed::new(format!("ws://{addr}"), topics.clone())
        .with_backoff(Backoff::new(Duration::from_secs(60), Duration::from_secs(60)));
    let (tx, mut rx) = mpsc::channel(16);
    let worker = tokio::spawn(async move { feed.run(tx).await });

    match next_event(&mut rx).await {
        FeedEvent::Connected { topics: got } => assert_eq!(got, topics),
        other => panic!("expected Connected, got {other:?}"),
    }
    match next_event(&mut rx).await {
        FeedEvent::Message(raw) => assert!(raw.contains("\"sc\":\"K1ABC\"")),
        other => panic!("expected Message, got {other:?}"),
    }
    match next_event(&mut rx).await {
        FeedEvent::Message(raw) => assert_eq!(raw, "not json"),
        other => panic!("expected Message, got {other:?}"),
    }
    assert!(matches!(
        next_event(&mut rx).await,
        FeedEvent::Disconnected { .. }
    ));

    let subscribe = server.await.unwrap();
    assert_eq!(subscribe["action"], "subscribe");
    assert_eq!(subscribe["topics"][0], "pskr/filter/v2/20m/FT8/+/DL1ABC/#");

    worker.abort();
}

#[tokio::test]
async fn stops_when_receiver_is_dropped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ = ws.next().await;
        // Keep the connection open until the client goes away.
        while ws.next().await.is_some() {}
    });

    let feed = WsSpotFeed::new(format!("ws://{addr}"), vec!["pskr/filter/v2/#".into()]);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let result = timeout(WAIT, feed.run(tx)).await.expect("feed did not stop");
    assert!(result.is_err());
}

#[tokio::test]
async fn failed_connect_is_reported_as_disconnect() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let feed = WsSpotFeed::new(format!("ws://{addr}"), vec!["pskr/filter/v2/#".into()])
        .with_backoff(Backoff::new(Duration::from_secs(60), Duration::from_secs(60)));
    let (tx, mut rx) = mpsc::channel(4);
    let worker = tokio::spawn(async move { feed.run(tx).await });

    match next_event(&mut rx).await {
        FeedEvent::Disconnected { reason } => assert!(reason.contains("connect failed"), "{reason}"),
        other => panic!("expected Disconnected, got {other:?}"),
    }

    worker.abort();
}
