//! Probe integration tests against a mock HTTP server

use super::*;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};
use wiremock::{
    matchers::{header, method, path, query_param_is_missing},
    Mock, MockServer, Request, ResponseTemplate,
};

const FILE_PATH: &str = "/10mb.test";
const BYTES: f64 = crate::models::BYTES_PER_MB;

/// Mock server serving a fixed-size probe file
struct MockProbeServer {
    server: MockServer,
}

impl MockProbeServer {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    fn target(&self, expected_size_bytes: u64) -> ProbeTarget {
        ProbeTarget::new(format!("{}{}", self.server.uri(), FILE_PATH), expected_size_bytes)
    }

    async fn mock_body(&self, size: usize, delay: Option<Duration>) {
        let mut template = ResponseTemplate::new(200).set_body_bytes(vec![b'x'; size]);
        if let Some(delay) = delay {
            template = template.set_delay(delay);
        }

        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    async fn mock_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(FILE_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string("Error"))
            .mount(&self.server)
            .await;
    }

    async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}

fn probe() -> SpeedProbe {
    SpeedProbe::new(Duration::from_secs(10), Logger::silent("TEST")).unwrap()
}

fn counting_progress() -> (
    Arc<AtomicUsize>,
    Arc<Mutex<f64>>,
    impl Fn(TransferProgress) + Send + Sync,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new(0.0));
    let (c, l) = (calls.clone(), last.clone());
    (calls, last, move |progress: TransferProgress| {
        c.fetch_add(1, Ordering::SeqCst);
        *l.lock().unwrap() = progress.fraction();
    })
}

/// Serve a `total`-byte body but send only the first `sent` bytes, then hold
/// the connection open
async fn stalled_body_server(total: usize, sent: usize) -> (ProbeTarget, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;

        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/octet-stream\r\ncontent-length: {}\r\n\r\n",
            total
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&vec![b'x'; sent]).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let target = ProbeTarget::new(format!("http://{}{}", addr, FILE_PATH), total as u64);
    (target, server)
}

#[tokio::test]
async fn test_exact_size_download_yields_measurement() {
    let server = MockProbeServer::new().await;
    server.mock_body(64 * 1024, None).await;
    let (calls, last, on_progress) = counting_progress();

    let measurement = probe()
        .run(&server.target(64 * 1024), &CancelToken::never(), &on_progress)
        .await
        .unwrap();

    assert_eq!(measurement.data_downloaded_mb, 64.0 * 1024.0 / BYTES);
    assert!(measurement.speed_mbps >= 0.0);
    assert!(measurement.speed_mbps.is_finite());
    assert_eq!(measurement.cumulative_downloaded_mb, 0.0);
    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert_eq!(*last.lock().unwrap(), 1.0);
}

#[tokio::test]
async fn test_request_is_cache_busted() {
    let server = MockProbeServer::new().await;
    server.mock_body(16, None).await;

    probe()
        .run(&server.target(16), &CancelToken::never(), &|_| {})
        .await
        .unwrap();

    let requests = server.requests().await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.url.query_pairs().any(|(k, v)| k == "nocache" && !v.is_empty()));
    assert_eq!(
        request.headers.get("cache-control").and_then(|v| v.to_str().ok()),
        Some("no-cache")
    );
}

#[tokio::test]
async fn test_unbusted_url_never_requested() {
    let server = MockProbeServer::new().await;
    // Any request without the cache-busting parameter would hit this and fail the probe
    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .and(query_param_is_missing("nocache"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server.server)
        .await;
    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 8]))
        .mount(&server.server)
        .await;

    let result = probe().run(&server.target(8), &CancelToken::never(), &|_| {}).await;
    assert!(result.is_ok(), "unexpected outcome: {:?}", result);
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockProbeServer::new().await;
    server.mock_status(503).await;

    let result = probe().run(&server.target(1024), &CancelToken::never(), &|_| {}).await;
    assert_eq!(result, Err(ProbeError::HttpStatus { status: 503 }));
}

#[tokio::test]
async fn test_not_found_status() {
    let server = MockProbeServer::new().await;
    server.mock_status(404).await;

    let result = probe().run(&server.target(1024), &CancelToken::never(), &|_| {}).await;
    assert_eq!(result, Err(ProbeError::HttpStatus { status: 404 }));
}

#[tokio::test]
async fn test_truncated_body_is_incomplete() {
    let server = MockProbeServer::new().await;
    server.mock_body(1000, None).await;

    let result = probe().run(&server.target(2000), &CancelToken::never(), &|_| {}).await;
    assert_eq!(
        result,
        Err(ProbeError::IncompleteTransfer { got: 1000, expected: 2000 })
    );
}

#[tokio::test]
async fn test_oversized_body_is_incomplete() {
    let server = MockProbeServer::new().await;
    server.mock_body(3000, None).await;

    let result = probe().run(&server.target(2000), &CancelToken::never(), &|_| {}).await;
    assert_eq!(
        result,
        Err(ProbeError::IncompleteTransfer { got: 3000, expected: 2000 })
    );
}

#[tokio::test]
async fn test_empty_body_is_incomplete() {
    let server = MockProbeServer::new().await;
    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server.server)
        .await;

    let result = probe().run(&server.target(10), &CancelToken::never(), &|_| {}).await;
    assert_eq!(result, Err(ProbeError::IncompleteTransfer { got: 0, expected: 10 }));
}

#[tokio::test]
async fn test_cancel_before_response_headers() {
    let server = MockProbeServer::new().await;
    server.mock_body(1024, Some(Duration::from_secs(5))).await;

    let (handle, token) = cancel_pair();
    let target = server.target(1024);
    let probe = probe();

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    };
    let started = Instant::now();
    let (result, _) = tokio::join!(probe.run(&target, &token, &|_| {}), canceller);

    assert_eq!(result, Err(ProbeError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_cancel_between_body_chunks() {
    let (target, server) = stalled_body_server(4096, 1024).await;
    let (handle, token) = cancel_pair();

    let received = Arc::new(AtomicU64::new(0));
    let seen = received.clone();
    let on_progress = move |progress: TransferProgress| {
        seen.store(progress.received_bytes, Ordering::SeqCst);
        handle.cancel();
    };

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        probe().run(&target, &token, &on_progress),
    )
    .await
    .expect("cancelling should end the stalled transfer");

    assert_eq!(result, Err(ProbeError::Cancelled));
    let received = received.load(Ordering::SeqCst);
    assert!(received > 0 && received < 4096, "received {} bytes", received);
    server.abort();
}

#[tokio::test]
async fn test_request_timeout_is_transport_error() {
    let server = MockProbeServer::new().await;
    server.mock_body(1024, Some(Duration::from_secs(5))).await;

    let probe = SpeedProbe::new(Duration::from_millis(200), Logger::silent("TEST")).unwrap();
    let result = probe.run(&server.target(1024), &CancelToken::never(), &|_| {}).await;

    assert!(matches!(result, Err(ProbeError::Transport(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Reserve a port and release it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let target = ProbeTarget::new(format!("http://127.0.0.1:{}{}", port, FILE_PATH), 10);
    let result = probe().run(&target, &CancelToken::never(), &|_| {}).await;
    assert!(matches!(result, Err(ProbeError::Transport(_))), "got {:?}", result);
}
