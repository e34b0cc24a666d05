//! End-to-end tests against a real listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use telemetry_collector::{
    ApplicationInfo, Collector, ConsoleEntry, LogLevel, NetworkEntry, ServerConfig, StoreConfig,
    TelemetryServer,
};

struct TestServer {
    server: Arc<TelemetryServer>,
    collector: Collector,
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<telemetry_collector::Result<()>>>,
}

impl TestServer {
    async fn start(store: StoreConfig, config: ServerConfig) -> Self {
        let collector = Collector::new(store).unwrap();
        let server = Arc::new(TelemetryServer::new(config, &collector));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let running = Arc::clone(&server);
        let handle = tokio::spawn(async move {
            running
                .serve_until(listener, async {
                    let _ = stopped.await;
                })
                .await
        });

        Self {
            server,
            collector,
            addr,
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = reqwest::get(self.url(path)).await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn wait_for_clients(&self, expected: usize) {
        for _ in 0..200 {
            if self.server.registry().client_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {expected} streaming clients, found {}",
            self.server.registry().client_count()
        );
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap().unwrap();
        }
    }
}

fn network(id: &str) -> NetworkEntry {
    NetworkEntry::builder("GET", format!("/orders/{id}"))
        .id(id)
        .status(200)
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_eviction_visible_over_rest() {
    let server = TestServer::start(
        StoreConfig::default().network_capacity(2),
        ServerConfig::default(),
    )
    .await;

    for id in ["A", "B", "C"] {
        server.collector.add_network(network(id));
    }

    let (status, page) = server.get_json("/api/network").await;
    assert_eq!(status, 200);
    assert_eq!(page["total"], 2);
    let ids: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["B", "C"]);

    let (status, body) = server.get_json("/api/network/A").await;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);

    let (status, body) = server.get_json("/api/network/B").await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], "B");
    assert_eq!(body["url"], "/orders/B");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_websocket_receives_each_record_once() {
    let server = TestServer::start(StoreConfig::default(), ServerConfig::default()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(server.ws_url()).await.unwrap();
    server.wait_for_clients(1).await;

    server
        .collector
        .add_log(ConsoleEntry::new(LogLevel::Information, "e2e", "hello"));

    let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("no envelope received")
        .unwrap()
        .unwrap();
    let Message::Text(text) = message else {
        panic!("expected a text frame, got {message:?}");
    };
    let envelope: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(envelope["type"], "console:entry");
    assert_eq!(envelope["data"]["message"], "hello");
    assert_eq!(envelope["data"]["category"], "e2e");

    // Exactly one delivery
    let extra = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(extra.is_err(), "unexpected second frame: {extra:?}");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clear_then_status() {
    let server = TestServer::start(StoreConfig::default(), ServerConfig::default()).await;
    server.collector.add_network(network("x1"));
    server.collector.add_network(network("x2"));

    let (_, status) = server.get_json("/api/status").await;
    assert_eq!(status["networkEntryCount"], 2);

    let response = reqwest::Client::new()
        .post(server.url("/api/network/clear"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);

    let (_, status) = server.get_json("/api/status").await;
    assert_eq!(status["networkEntryCount"], 0);
    assert!(status["connectionsAccepted"].as_u64().unwrap() >= 1);

    let (code, _) = server.get_json("/api/network/x1").await;
    assert_eq!(code, 404);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_late_joiner_gets_application_info_first() {
    let server = TestServer::start(StoreConfig::default(), ServerConfig::default()).await;
    server
        .collector
        .set_application_info(ApplicationInfo::capture("checkout", "3.1.0"));

    let (mut ws, _) = tokio_tungstenite::connect_async(server.ws_url()).await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("no catch-up envelope")
        .unwrap()
        .unwrap();
    let envelope: Value = serde_json::from_str(message.to_text().unwrap()).unwrap();
    assert_eq!(envelope["type"], "application:info");
    assert_eq!(envelope["data"]["name"], "checkout");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_auth_over_the_wire() {
    let server = TestServer::start(
        StoreConfig::default(),
        ServerConfig::default().auth_token("wire-token"),
    )
    .await;
    let client = reqwest::Client::new();

    let denied = client.get(server.url("/api/status")).send().await.unwrap();
    assert_eq!(denied.status().as_u16(), 401);

    let allowed = client
        .get(server.url("/api/status"))
        .bearer_auth("wire-token")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status().as_u16(), 200);

    // The upgrade path needs no token
    let (_ws, _) = tokio_tungstenite::connect_async(server.ws_url()).await.unwrap();
    server.wait_for_clients(1).await;

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_websocket_holds_connection_slot() {
    let server = TestServer::start(
        StoreConfig::default(),
        ServerConfig::default().max_connections(1),
    )
    .await;
    let stats = Arc::clone(server.server.stats());

    let (ws, _) = tokio_tungstenite::connect_async(server.ws_url()).await.unwrap();
    server.wait_for_clients(1).await;
    assert_eq!(stats.snapshot().active_connections, 1);

    // The upgraded socket still occupies the only slot
    let second = tokio::time::timeout(
        Duration::from_secs(5),
        tokio_tungstenite::connect_async(server.ws_url()),
    )
    .await
    .expect("second handshake hung");
    assert!(second.is_err());
    assert!(stats.snapshot().connections_rejected >= 1);
    assert_eq!(server.server.registry().client_count(), 1);

    drop(ws);
    server.wait_for_clients(0).await;
    for _ in 0..200 {
        if stats.snapshot().active_connections == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stats.snapshot().active_connections, 0);

    let (_ws, _) = tokio_tungstenite::connect_async(server.ws_url()).await.unwrap();
    server.wait_for_clients(1).await;

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_closes_streaming_clients() {
    let server = TestServer::start(StoreConfig::default(), ServerConfig::default()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(server.ws_url()).await.unwrap();
    server.wait_for_clients(1).await;

    let registry = Arc::clone(server.server.registry());
    server.stop().await;
    assert_eq!(registry.client_count(), 0);

    // The socket ends with a close frame or EOF, never more envelopes
    let next = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("socket not closed");
    match next {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => {}
        Some(Ok(other)) => panic!("unexpected frame after shutdown: {other:?}"),
    }
}
