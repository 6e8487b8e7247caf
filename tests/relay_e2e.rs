//! End-to-end relay tests over real TCP

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use telemetry_relay::client::{Publisher, RelayConnector};
use telemetry_relay::registry::{EchoMode, RegistryConfig};
use telemetry_relay::{DecimalDomain, RelayEvent, RelayServer, ServerConfig, StreamItem};

struct Harness {
    server: Arc<RelayServer>,
    addr: SocketAddr,
    admin_addr: SocketAddr,
    events: broadcast::Receiver<RelayEvent>,
}

async fn start(config: ServerConfig) -> Harness {
    let server = Arc::new(RelayServer::new(config));
    let events = server.events().subscribe();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let admin_addr = admin.local_addr().unwrap();

    tokio::spawn({
        let server = Arc::clone(&server);
        async move {
            server
                .serve(listener, Some(admin), std::future::pending())
                .await
        }
    });

    Harness {
        server,
        addr,
        admin_addr,
        events,
    }
}

/// Connect and consume the welcome item
async fn join(addr: SocketAddr) -> RelayConnector {
    let mut conn = RelayConnector::connect(addr).await.unwrap();
    let welcome = recv(&mut conn).await;
    assert_eq!(welcome.producer_id(), "System");
    conn
}

async fn recv(conn: &mut RelayConnector) -> StreamItem {
    tokio::time::timeout(Duration::from_secs(2), conn.expect_item())
        .await
        .expect("timed out waiting for item")
        .unwrap()
}

async fn next_event(events: &mut broadcast::Receiver<RelayEvent>) -> RelayEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for event")
        .unwrap()
}

fn drain(events: &mut broadcast::Receiver<RelayEvent>) -> Vec<RelayEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Minimal HTTP/1.1 GET returning (status line, body)
async fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: relay\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head.lines().next().unwrap().to_string();
    (status, body.to_string())
}

#[tokio::test]
async fn test_fan_out_to_all_consumers_in_order() {
    let mut h = start(ServerConfig::default()).await;

    let mut a = join(h.addr).await;
    let mut b = join(h.addr).await;
    let mut c = join(h.addr).await;

    let x1 = StreamItem::numeric_text("p1", "0.125");
    let x2 = StreamItem::numeric_text("p1", "0.5");
    a.send(&x1).await.unwrap();
    a.send(&x2).await.unwrap();

    for conn in [&mut b, &mut c] {
        assert_eq!(recv(conn).await, x1);
        assert_eq!(recv(conn).await, x2);
    }

    let events = drain(&mut h.events);
    let joined = events
        .iter()
        .filter(|e| matches!(e, RelayEvent::ProducerJoined { producer_id, .. } if producer_id == "p1"))
        .count();
    assert_eq!(joined, 1);

    let latest = h.server.relay().latest_snapshot();
    assert_eq!(latest["p1"], Decimal::from_str("0.5").unwrap());
}

#[tokio::test]
async fn test_disconnect_mid_stream_leaves_once() {
    let mut h = start(ServerConfig::default()).await;

    let mut a = join(h.addr).await;
    let mut b = join(h.addr).await;

    a.send(&StreamItem::numeric_text("p1", "1")).await.unwrap();
    recv(&mut b).await;
    assert!(matches!(next_event(&mut h.events).await, RelayEvent::ProducerJoined { .. }));
    assert!(matches!(next_event(&mut h.events).await, RelayEvent::ValueUpdated { .. }));

    drop(a);

    match next_event(&mut h.events).await {
        RelayEvent::ProducerLeft { producer_id, .. } => assert_eq!(producer_id, "p1"),
        other => panic!("unexpected event {other:?}"),
    }

    // Subsequent broadcasts reach only B
    b.send(&StreamItem::text("b", "still here")).await.unwrap();
    assert_eq!(recv(&mut b).await.text_body(), Some("still here"));
    assert_eq!(h.server.relay().registry().len(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(drain(&mut h.events)
        .iter()
        .all(|e| !matches!(e, RelayEvent::ProducerLeft { .. })));
}

#[tokio::test]
async fn test_reconnect_takes_over_producer() {
    let mut h = start(ServerConfig::default()).await;

    let mut first = join(h.addr).await;
    first.send(&StreamItem::numeric_text("p1", "1")).await.unwrap();
    recv(&mut first).await;

    let mut second = join(h.addr).await;
    second.send(&StreamItem::numeric_text("p1", "2")).await.unwrap();
    recv(&mut second).await;

    // Old connection leaving does not remove the newer registration
    drop(first);
    tokio::time::timeout(Duration::from_secs(2), async {
        while h.server.relay().registry().len() != 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(h.server.relay().presence().is_present("p1"));

    drop(second);
    let left = loop {
        if let RelayEvent::ProducerLeft { producer_id, .. } = next_event(&mut h.events).await {
            break producer_id;
        }
    };
    assert_eq!(left, "p1");
    assert!(!h.server.relay().presence().is_present("p1"));
}

#[tokio::test]
async fn test_exclude_sender_echo_mode() {
    let config = ServerConfig::default()
        .registry(RegistryConfig::default().echo_mode(EchoMode::ExcludeSender));
    let h = start(config).await;

    let mut a = join(h.addr).await;
    let mut b = join(h.addr).await;

    a.send(&StreamItem::text("a", "one")).await.unwrap();
    b.send(&StreamItem::text("b", "two")).await.unwrap();

    assert_eq!(recv(&mut b).await.text_body(), Some("one"));
    assert_eq!(recv(&mut a).await.text_body(), Some("two"));
}

#[tokio::test]
async fn test_admin_endpoints() {
    let h = start(ServerConfig::default()).await;

    let mut a = join(h.addr).await;
    a.send(&StreamItem::numeric_text("p1", "0.75")).await.unwrap();
    recv(&mut a).await;

    let (status, body) = http_get(h.admin_addr, "/health").await;
    assert!(status.contains("200"));
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["connected_peer_count"], 1);
    assert_eq!(health["server_instance_id"], h.server.relay().instance_id());

    let (_, body) = http_get(h.admin_addr, "/latest").await;
    let latest: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(latest["p1"], "0.75");

    let (_, body) = http_get(h.admin_addr, "/history/p1").await;
    let history: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["value"], "0.75");

    let (status, _) = http_get(h.admin_addr, "/history/ghost").await;
    assert!(status.contains("404"));
}

#[tokio::test]
async fn test_publisher_survives_its_own_echoes() {
    let registry = RegistryConfig::default()
        .outbound_capacity(4)
        .write_timeout(Duration::from_millis(50));
    let h = start(ServerConfig::default().registry(registry)).await;

    // Event receiver is never drained
    let (mut publisher, _events) = Publisher::new(h.addr, "p1", DecimalDomain::Unbounded);
    publisher.connect().await.unwrap();

    let last = Decimal::from(4999);
    for i in 0..5000 {
        publisher.send_value(Decimal::from(i)).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.server.relay().store().latest("p1") != Some(last) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("last value never stored");

    assert!(publisher.is_connected());
    assert_eq!(h.server.relay().registry().len(), 1);
    assert!(h.server.relay().presence().is_present("p1"));
}

#[tokio::test]
async fn test_producers_endpoint() {
    let h = start(ServerConfig::default()).await;

    let mut a = join(h.addr).await;
    a.send(&StreamItem::numeric_text("p2", "1")).await.unwrap();
    a.send(&StreamItem::numeric_text("p1", "1")).await.unwrap();
    recv(&mut a).await;
    recv(&mut a).await;

    let (status, body) = http_get(h.admin_addr, "/producers").await;
    assert!(status.contains("200"));
    let producers: Vec<String> = serde_json::from_str(&body).unwrap();
    assert_eq!(producers, vec!["p1".to_string(), "p2".to_string()]);
}
