//! End-to-end tests for the relay against a local mock collector.
//!
//! The mock is a plain TCP listener speaking just enough HTTP/1.1 for
//! reqwest: it records each request's path and body and answers with a
//! canned status.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use transcript_relay::{
    config::RelayConfig,
    delivery::{Collector, DeliveryClient},
    protocol::Record,
    queue::PendingQueue,
    sync::SyncCoordinator,
};

/// A captured request: request-line path and body text.
#[derive(Debug, Clone)]
struct CapturedRequest {
    path: String,
    body: String,
}

struct MockCollector {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockCollector {
    /// Start a mock collector answering every request with the given status.
    async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));

        let log = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let log = log.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, status, log).await;
                });
            }
        });

        Self { addr, requests }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    async fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    status: u16,
    log: Arc<Mutex<Vec<CapturedRequest>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    // Read until end of headers.
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let path = headers
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or_default()
        .to_string();

    let content_length: usize = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0);

    // Read the remainder of the body.
    while buf.len() < header_end + 4 + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end + 4..]).to_string();

    log.lock().await.push(CapturedRequest { path, body });

    let (reason, body) = match status {
        200 => ("OK", r#"{"status":"ok"}"#),
        500 => ("Internal Server Error", "internal error"),
        _ => ("Unknown", ""),
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn config_for(base_url: String, dir: &tempfile::TempDir) -> RelayConfig {
    RelayConfig {
        collector_url: base_url,
        request_timeout_secs: 5,
        health_timeout_secs: 2,
        queue_slot: dir.path().join("pending.json"),
    }
}

/// Bind and drop a listener so the port is very likely to refuse connections.
async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_submit_one_hits_voicedata_endpoint() {
    let mock = MockCollector::start(200).await;
    let dir = tempfile::tempdir().unwrap();
    let client = DeliveryClient::new(&config_for(mock.base_url(), &dir)).unwrap();

    let record = Record::with_id("r-1", "hello collector").language("en");
    let outcome = client.submit_one(&record).await;
    assert!(outcome.is_delivered());

    let requests = mock.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/voicedata");

    let sent: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(sent["id"], "r-1");
    assert_eq!(sent["text"], "hello collector");
    assert_eq!(sent["language"], "en");
}

#[tokio::test]
async fn test_deliver_now_against_500_queues_record() {
    let mock = MockCollector::start(500).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(mock.base_url(), &dir);

    let queue = PendingQueue::open(config.queue_slot.clone()).await.unwrap();
    let client = DeliveryClient::new(&config).unwrap();
    let coordinator = SyncCoordinator::new(queue, client);

    let report = coordinator.deliver_now(Record::with_id("c", "rejected")).await;
    assert!(!report.success);
    assert_eq!(report.message, "saved offline, will sync later");

    let snapshot = coordinator.queue().snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, "c");
}

#[tokio::test]
async fn test_offline_then_restart_then_drain() {
    let dir = tempfile::tempdir().unwrap();
    let slot = dir.path().join("pending.json");

    // Offline session: both live deliveries fail and land in the queue.
    {
        let config = RelayConfig {
            collector_url: refused_url().await,
            request_timeout_secs: 2,
            health_timeout_secs: 1,
            queue_slot: slot.clone(),
        };
        let queue = PendingQueue::open(slot.clone()).await.unwrap();
        let client = DeliveryClient::new(&config).unwrap();
        let coordinator = SyncCoordinator::new(queue, client);

        let report = coordinator.deliver_now(Record::with_id("a", "one")).await;
        assert!(!report.success);
        let report = coordinator.deliver_now(Record::with_id("b", "two")).await;
        assert!(!report.success);
        assert_eq!(coordinator.queue().len().await, 2);
    }

    // Restart: queue reloads from the slot, connectivity is back.
    let mock = MockCollector::start(200).await;
    let config = config_for(mock.base_url(), &dir);
    let queue = PendingQueue::open(slot).await.unwrap();
    assert_eq!(queue.len().await, 2);

    let client = DeliveryClient::new(&config).unwrap();
    let coordinator = SyncCoordinator::new(queue, client);
    let report = coordinator.drain().await;

    assert!(report.success);
    assert_eq!(report.delivered, 2);
    assert_eq!(coordinator.queue().len().await, 0);

    // One atomic batch on the wire, with the count framing.
    let requests = mock.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/voicedata/batch");
    let sent: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(sent["count"], 2);
    assert_eq!(sent["data"][0]["id"], "a");
    assert_eq!(sent["data"][1]["id"], "b");
}

#[tokio::test]
async fn test_failed_drain_keeps_backlog() {
    let mock = MockCollector::start(500).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(mock.base_url(), &dir);

    let queue = PendingQueue::open(config.queue_slot.clone()).await.unwrap();
    queue.append(Record::with_id("a", "one")).await.unwrap();

    let client = DeliveryClient::new(&config).unwrap();
    let coordinator = SyncCoordinator::new(queue, client);
    let report = coordinator.drain().await;

    assert!(!report.success);
    assert_eq!(report.pending, 1);
    assert_eq!(coordinator.queue().len().await, 1);
}

#[tokio::test]
async fn test_connection_refused_classifies_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let config = RelayConfig {
        collector_url: refused_url().await,
        request_timeout_secs: 2,
        health_timeout_secs: 1,
        queue_slot: dir.path().join("pending.json"),
    };
    let client = DeliveryClient::new(&config).unwrap();

    let outcome = client.submit_one(&Record::with_id("x", "unreachable")).await;
    assert!(!outcome.is_delivered());
}

#[tokio::test]
async fn test_health_probe() {
    let mock = MockCollector::start(200).await;
    let dir = tempfile::tempdir().unwrap();

    let client = DeliveryClient::new(&config_for(mock.base_url(), &dir)).unwrap();
    assert!(client.check_health().await);

    let down = DeliveryClient::new(&RelayConfig {
        collector_url: refused_url().await,
        health_timeout_secs: 1,
        ..RelayConfig::default()
    })
    .unwrap();
    assert!(!down.check_health().await);

    let unhealthy_mock = MockCollector::start(500).await;
    let unhealthy = DeliveryClient::new(&config_for(unhealthy_mock.base_url(), &dir)).unwrap();
    assert!(!unhealthy.check_health().await);
}
