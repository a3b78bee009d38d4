// End-to-end tests against a local WebSocket server

use futures_util::{SinkExt, StreamExt};
use live_metrics::{ConnectionStatus, FeedConfig, FeedEvent, LiveFeed, ReconnectPolicy};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const TIMEOUT: Duration = Duration::from_secs(10);

fn sample(ts: &str, alarm: bool) -> String {
    format!(
        r#"{{"ts":"{ts}","cpu":42.5,"mem":63.1,"netInBps":2048.0,"netOutBps":1024.0,"diskReadBps":0.0,"diskWriteBps":8192.0,"score_ecod":0.2,"score_iforest":0.3,"score_ens":0.3,"threshold":0.8,"exceed":false,"alarm":{alarm}}}"#
    )
}

/// Serve one WebSocket session per entry, then reject every later handshake
async fn serve(listener: TcpListener, sessions: Vec<Vec<String>>) {
    for frames in sessions {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");

        for frame in frames {
            ws.send(Message::text(frame)).await.expect("send");
        }

        ws.close(None).await.ok();
        while let Some(Ok(_)) = ws.next().await {}
    }

    while let Ok((stream, _)) = listener.accept().await {
        drop(stream);
    }
}

async fn start_server(sessions: Vec<Vec<String>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, sessions));
    format!("ws://{addr}/ws/metrics")
}

fn config(url: String, max_attempts: u32) -> FeedConfig {
    FeedConfig {
        url,
        reconnect: ReconnectPolicy::new(Duration::from_millis(20), max_attempts),
        window_capacity: 300,
    }
}

#[tokio::test]
async fn test_receives_samples_and_skips_malformed() {
    let url = start_server(vec![vec![
        sample("one", false),
        "this is not json".to_string(),
        sample("two", true),
    ]])
    .await;

    let mut feed = LiveFeed::websocket(config(url, 0)).unwrap();
    tokio_test::assert_ok!(feed.start());
    tokio::time::timeout(TIMEOUT, feed.closed()).await.unwrap();

    let view = feed.view();
    let ts: Vec<&str> = view.samples.iter().map(|s| s.ts.as_str()).collect();
    assert_eq!(ts, vec!["one", "two"]);
    assert!(view.alarm_active);
    assert!(view.has_scores);
    assert_eq!(view.status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let url = start_server(vec![vec![sample("a", false)], vec![sample("b", false)]]).await;

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&statuses);

    let mut feed = LiveFeed::websocket(config(url, 1)).unwrap();
    feed.set_event_callback(move |event| {
        if let FeedEvent::StatusChanged { status, .. } = event {
            recorded.lock().unwrap().push(*status);
        }
    });
    tokio_test::assert_ok!(feed.start());
    tokio::time::timeout(TIMEOUT, feed.closed()).await.unwrap();

    let ts: Vec<String> = feed.samples().into_iter().map(|s| s.ts).collect();
    assert_eq!(ts, vec!["a", "b"]);

    // Second session reset the counter, so one more retry was allowed
    assert_eq!(feed.reconnect_attempts(), 1);
    assert_eq!(feed.status(), ConnectionStatus::Disconnected);

    let connected = statuses
        .lock()
        .unwrap()
        .iter()
        .filter(|s| **s == ConnectionStatus::Connected)
        .count();
    assert_eq!(connected, 2);
}

#[tokio::test]
async fn test_refused_endpoint_exhausts_attempts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut feed = LiveFeed::websocket(config(format!("ws://{addr}/ws/metrics"), 2)).unwrap();
    tokio_test::assert_ok!(feed.start());
    tokio::time::timeout(TIMEOUT, feed.closed()).await.unwrap();

    assert_eq!(feed.status(), ConnectionStatus::Disconnected);
    assert_eq!(feed.reconnect_attempts(), 2);
    assert!(feed.samples().is_empty());
}

#[tokio::test]
async fn test_shutdown_while_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Server keeps the connection open until the client closes it
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::text(sample("held", false))).await.unwrap();
        let mut saw_close = false;
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                saw_close = true;
            }
        }
        saw_close
    });

    let mut feed = LiveFeed::websocket(config(format!("ws://{addr}/ws/metrics"), 5)).unwrap();
    tokio_test::assert_ok!(feed.start());

    tokio::time::timeout(TIMEOUT, async {
        while feed.samples().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(feed.status(), ConnectionStatus::Connected);

    tokio::time::timeout(TIMEOUT, feed.shutdown()).await.unwrap();
    assert_eq!(feed.status(), ConnectionStatus::Disconnected);

    let saw_close = tokio::time::timeout(TIMEOUT, server).await.unwrap().unwrap();
    assert!(saw_close);
}
