use super::probe::{Probe, ProbeError, TimingProbe};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

async fn read_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Answers every connection with `204 No Content` and reports the request
/// head it received.
async fn spawn_http_server() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let head = read_head(&mut stream).await;
                let _ = tx.send(head);
                let _ = stream
                    .write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = stream.shutdown().await;
            });
        }
    });
    (addr, rx)
}

fn probe(timeout: Duration) -> TimingProbe {
    TimingProbe::new(timeout).expect("tls connector")
}

#[tokio::test]
async fn test_measure_plain_http_target() {
    let (addr, mut requests) = spawn_http_server().await;

    let metrics = probe(Duration::from_secs(5))
        .measure(&format!("http://{addr}/health?x=1"))
        .await
        .expect("probe should succeed");

    assert_eq!(metrics.tls_ms, 0);
    assert_eq!(metrics.dns_ms, 0, "IP literal targets skip DNS");
    assert!(metrics.total_ms >= metrics.ttfb_ms);
    assert!(metrics.ttfb_ms >= metrics.dns_ms + metrics.connect_ms + metrics.tls_ms);

    let head = requests.recv().await.unwrap().to_lowercase();
    assert!(head.starts_with("head /health?x=1 http/1.1\r\n"), "{head}");
    assert!(head.contains("connection: close"), "{head}");
    assert!(head.contains(&format!("host: {addr}")), "{head}");
}

#[tokio::test]
async fn test_every_measurement_opens_a_new_connection() {
    let (addr, mut requests) = spawn_http_server().await;
    let probe = probe(Duration::from_secs(5));
    let target = format!("http://{addr}/");

    probe.measure(&target).await.unwrap();
    probe.measure(&target).await.unwrap();

    // one request head per accepted connection
    assert!(requests.recv().await.is_some());
    assert!(requests.recv().await.is_some());
}

#[tokio::test]
async fn test_measure_resolves_host_names() {
    let (addr, _requests) = spawn_http_server().await;

    let metrics = probe(Duration::from_secs(5))
        .measure(&format!("http://localhost:{}/", addr.port()))
        .await
        .expect("localhost should resolve");

    assert!(metrics.total_ms >= metrics.ttfb_ms);
}

#[tokio::test]
async fn test_malformed_url_fails_without_timings() {
    let failure = probe(Duration::from_secs(5))
        .measure("not a url")
        .await
        .unwrap_err();

    assert!(matches!(failure.error, ProbeError::InvalidUrl(_)));
    assert_eq!(failure.metrics, Default::default());
    assert!(!failure.to_string().is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let failure = probe(Duration::from_secs(5))
        .measure(&format!("http://{addr}/"))
        .await
        .unwrap_err();

    assert!(
        matches!(failure.error, ProbeError::Connect { .. }),
        "{:?}",
        failure.error
    );
    assert_eq!(failure.metrics.ttfb_ms, 0);
}

#[tokio::test]
async fn test_silent_server_times_out_with_partial_timings() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let failure = probe(Duration::from_millis(200))
        .measure(&format!("http://{addr}/"))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, ProbeError::Timeout(_)));
    assert!(failure.metrics.total_ms >= 200);
    assert_eq!(failure.metrics.ttfb_ms, 0);
}

#[tokio::test]
async fn test_tls_failure_keeps_handshake_timing() {
    // speaks plain HTTP to a TLS client
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut hello = [0u8; 512];
            let _ = stream.read(&mut hello).await;
            let _ = stream
                .write_all(b"HTTP/1.1 400 Bad Request\r\nConnection: close\r\n\r\n")
                .await;
            let _ = stream.shutdown().await;
        }
    });

    let failure = probe(Duration::from_secs(5))
        .measure(&format!("https://{addr}/"))
        .await
        .unwrap_err();

    assert!(
        matches!(failure.error, ProbeError::Tls { .. }),
        "{:?}",
        failure.error
    );
    assert!(failure.metrics.total_ms >= failure.metrics.tls_ms);
}
