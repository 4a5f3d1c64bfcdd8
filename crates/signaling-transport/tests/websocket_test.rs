//! Runs the WebSocket transport against a real localhost server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serial_test::serial;
use tokio_test::assert_ok;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use txrtc_signaling_transport::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Echo server that closes after `frames` text frames
async fn spawn_echo_server(frames: usize) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut echoed = 0;
        while let Some(Ok(message)) = ws.next().await {
            if let WsMessage::Text(text) = message {
                ws.send(WsMessage::Text(text)).await.unwrap();
                echoed += 1;
                if echoed == frames {
                    let _ = ws.close(None).await;
                    break;
                }
            }
        }
    });

    Url::parse(&format!("ws://{}", addr)).unwrap()
}

async fn next_event(events: &mut tokio::sync::mpsc::Receiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

#[tokio::test]
#[serial]
async fn test_connect_send_receive_and_peer_close() {
    init_tracing();
    let url = spawn_echo_server(1).await;
    let (transport, mut events) = WebSocketTransport::new(TransportConfig::default());

    assert_ok!(transport.connect(&url).await);
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
    assert!(transport.is_connected());

    let frame = r#"{"jsonrpc":"2.0","id":"1","method":"telnyx_rtc.ping","params":{}}"#;
    assert_ok!(transport.send(frame.to_string()).await);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::TextReceived { text: frame.to_string() }
    );

    // The server closes after one frame; the address is not region pinned
    match next_event(&mut events).await {
        TransportEvent::Disconnected { for_reconnect, fallback_region, .. } => {
            assert!(!for_reconnect);
            assert_eq!(fallback_region, None);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!transport.is_connected());
    assert!(matches!(transport.send("late".into()).await, Err(Error::NotConnected)));
}

#[tokio::test]
#[serial]
async fn test_local_disconnect_reports_once() {
    init_tracing();
    let url = spawn_echo_server(10).await;
    let (transport, mut events) = WebSocketTransport::new(TransportConfig::default());

    assert_ok!(transport.connect(&url).await);
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

    transport.disconnect(true).await;
    transport.disconnect(true).await;
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Disconnected { reason: None, for_reconnect: true, fallback_region: None }
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
#[serial]
async fn test_refused_connection_on_auto_host() {
    init_tracing();
    // Bind then drop to get a port nobody listens on
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let url = Url::parse(&format!("ws://{}", addr)).unwrap();
    let (transport, mut events) = WebSocketTransport::new(TransportConfig::default());

    assert_ok!(transport.connect(&url).await);
    assert!(matches!(next_event(&mut events).await, TransportEvent::Error { .. }));
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Disconnected { for_reconnect: false, fallback_region: None, .. }
    ));

    // A failed attempt frees the transport for another one
    let url = spawn_echo_server(1).await;
    assert_ok!(transport.connect(&url).await);
    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);
}

#[tokio::test]
async fn test_factory_creates_independent_transports() {
    let factory = WebSocketTransportFactory::new(TransportConfig::default().with_tls_policy(TlsPolicy::AllowSelfSigned));
    let (first, _first_events) = factory.create();
    let (second, _second_events) = factory.create();
    assert!(!first.is_connected());
    assert!(!second.is_connected());
    assert!(!std::ptr::addr_eq(first.as_ref(), second.as_ref()));
}
