//! End-to-end tests against a real relay on a loopback port.
//!
//! Frames enter through a [`CaptureHandle`] exactly like a camera callback
//! would hand them over, and leave through real WebSocket clients.

use futures::{SinkExt, StreamExt};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use framerelay::encode::PassthroughEncoder;
use framerelay::sources::{CaptureHandle, ChannelSource};
use framerelay::types::{PixelFormat, RawFrame};
use framerelay::{FrameRelay, RelayConfig, RelayError, RelayStats, RunningRelay};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn loopback_config(port: u16) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.server.bind = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.server.port = port;
    config.server.send_timeout_ms = 1000;
    config
}

async fn start_relay() -> (RunningRelay, CaptureHandle) {
    let _ = tracing_subscriber::fmt::try_init();
    let (capture, source) = ChannelSource::new(30.0);
    let relay = FrameRelay::start(&loopback_config(0), source, PassthroughEncoder).await.unwrap();
    (relay, capture)
}

/// Minimal JPEG-looking payload tagged with `tag`
fn jpeg(tag: u8) -> Vec<u8> {
    vec![0xFF, 0xD8, tag, tag, 0xFF, 0xD9]
}

/// Submit a frame and wait until the relay has published it
async fn publish(relay: &RunningRelay, capture: &CaptureHandle, tag: u8) -> u64 {
    let before = relay.slot().current_version();
    assert!(capture.submit(RawFrame::new(2, 2, PixelFormat::Jpeg, jpeg(tag))));
    timeout(Duration::from_secs(2), async {
        loop {
            let version = relay.slot().current_version();
            if version > before {
                return version;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("frame was not published")
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}")).await.unwrap();
    client
}

async fn next_message(client: &mut Client) -> Message {
    timeout(Duration::from_secs(2), client.next())
        .await
        .expect("no message within two seconds")
        .expect("stream ended")
        .expect("transport error")
}

async fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    let (head, body) = response.split_once("\r\n\r\n").unwrap();
    (head.to_owned(), body.to_owned())
}

async fn wait_until(relay: &RunningRelay, what: &str, check: impl Fn(&RelayStats) -> bool) {
    timeout(Duration::from_secs(2), async {
        while !check(&relay.stats()) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{what} never settled: {:?}", relay.stats()));
}

async fn wait_for_live_sessions(relay: &RunningRelay, expected: u64) {
    wait_until(relay, "live session count", |stats| stats.active_live_sessions == expected).await;
}

#[tokio::test]
async fn root_answers_hello_world_without_any_frame() {
    let (relay, _capture) = start_relay().await;

    let (head, body) = http_get(relay.local_addr(), "/").await;
    assert!(head.starts_with("HTTP/1.1 200"), "unexpected status: {head}");
    assert_eq!(body, "Hello World");

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (relay, _capture) = start_relay().await;

    let (head, _) = http_get(relay.local_addr(), "/nope").await;
    assert!(head.starts_with("HTTP/1.1 404"), "unexpected status: {head}");

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn echo_greets_then_replies() {
    let (relay, _capture) = start_relay().await;
    let mut client = connect(relay.local_addr(), "/chat").await;

    match next_message(&mut client).await {
        Message::Text(text) => assert_eq!(text.as_str(), "You are connected!"),
        other => panic!("expected greeting, got {other:?}"),
    }

    client.send(Message::text("hello")).await.unwrap();
    match next_message(&mut client).await {
        Message::Text(text) => assert_eq!(text.as_str(), "You said: hello"),
        other => panic!("expected reply, got {other:?}"),
    }

    client.close(None).await.unwrap();
    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn live_client_waits_for_the_first_frame() {
    let (relay, capture) = start_relay().await;
    let mut client = connect(relay.local_addr(), "/live").await;
    wait_for_live_sessions(&relay, 1).await;

    let early = timeout(Duration::from_millis(100), client.next()).await;
    assert!(early.is_err(), "nothing may be sent before the first publish");

    publish(&relay, &capture, 1).await;
    match next_message(&mut client).await {
        Message::Binary(data) => assert_eq!(data.as_ref(), jpeg(1).as_slice()),
        other => panic!("expected binary frame, got {other:?}"),
    }

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn live_client_receives_versions_in_order() {
    let (relay, capture) = start_relay().await;
    let mut client = connect(relay.local_addr(), "/live").await;
    wait_for_live_sessions(&relay, 1).await;

    for tag in 1..=5u8 {
        publish(&relay, &capture, tag).await;
        match next_message(&mut client).await {
            Message::Binary(data) => assert_eq!(data[2], tag),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }
    wait_until(&relay, "frames sent", |stats| stats.frames_sent == 5).await;

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn dropping_one_live_client_leaves_others_untouched() {
    let (relay, capture) = start_relay().await;
    let addr = relay.local_addr();

    let mut survivor = connect(addr, "/live").await;
    let doomed = connect(addr, "/live").await;
    wait_for_live_sessions(&relay, 2).await;

    publish(&relay, &capture, 1).await;
    next_message(&mut survivor).await;

    // Abrupt disconnect, no close handshake
    drop(doomed);
    publish(&relay, &capture, 2).await;
    match next_message(&mut survivor).await {
        Message::Binary(data) => assert_eq!(data[2], 2),
        other => panic!("expected binary frame, got {other:?}"),
    }

    wait_for_live_sessions(&relay, 1).await;
    publish(&relay, &capture, 3).await;
    match next_message(&mut survivor).await {
        Message::Binary(data) => assert_eq!(data[2], 3),
        other => panic!("expected binary frame, got {other:?}"),
    }

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn capped_live_client_still_gets_the_latest_frame() {
    let (relay, capture) = start_relay().await;
    let mut client = connect(relay.local_addr(), "/live?fps=5").await;
    wait_for_live_sessions(&relay, 1).await;

    publish(&relay, &capture, 7).await;
    match next_message(&mut client).await {
        Message::Binary(data) => assert_eq!(data[2], 7),
        other => panic!("expected binary frame, got {other:?}"),
    }

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn extreme_fps_request_is_served_uncapped() {
    let (relay, capture) = start_relay().await;
    let mut client = connect(relay.local_addr(), &format!("/live?fps={}", u32::MAX)).await;
    wait_for_live_sessions(&relay, 1).await;

    for tag in 1..=3u8 {
        publish(&relay, &capture, tag).await;
        match next_message(&mut client).await {
            Message::Binary(data) => assert_eq!(data[2], tag),
            other => panic!("expected binary frame, got {other:?}"),
        }
    }
    assert_eq!(relay.stats().active_live_sessions, 1);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn status_reports_counters() {
    let (relay, capture) = start_relay().await;
    let mut client = connect(relay.local_addr(), "/live").await;
    wait_for_live_sessions(&relay, 1).await;
    publish(&relay, &capture, 1).await;
    next_message(&mut client).await;
    wait_until(&relay, "frames sent", |stats| stats.frames_sent == 1).await;

    let (head, body) = http_get(relay.local_addr(), "/status").await;
    assert!(head.starts_with("HTTP/1.1 200"));
    let stats: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(stats["current_version"], 1);
    assert_eq!(stats["active_live_sessions"], 1);
    assert_eq!(stats["frames_sent"], 1);

    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_ends_connected_sessions() {
    let (relay, _capture) = start_relay().await;
    let mut live = connect(relay.local_addr(), "/live").await;
    let mut chat = connect(relay.local_addr(), "/chat").await;
    next_message(&mut chat).await;
    wait_for_live_sessions(&relay, 1).await;

    timeout(Duration::from_secs(5), relay.shutdown()).await.unwrap().unwrap();

    // Either a close frame or the end of the stream, never a hang
    for client in [&mut live, &mut chat] {
        let end = timeout(Duration::from_secs(2), client.next()).await.unwrap();
        assert!(matches!(end, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
    }
}

#[tokio::test]
async fn occupied_port_fails_to_start() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let (_capture, source) = ChannelSource::new(30.0);
    let result = FrameRelay::start(&loopback_config(port), source, PassthroughEncoder).await;
    match result {
        Err(RelayError::Bind { addr, .. }) => assert_eq!(addr.port(), port),
        Err(other) => panic!("expected bind error, got {other}"),
        Ok(_) => panic!("relay started on an occupied port"),
    }
}
