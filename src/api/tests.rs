use super::*;
use crate::bus::{LocalBus, START_TOPIC, Subscription};
use crate::ping::model::{Metrics, PingResult, StreamEvent};
use crate::ping::probe::{Probe, ProbeFailure};
use crate::ping::sampler::Sampler;
use crate::ping::worker::Worker;
use crate::utils::error::BusError;
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

struct FixedProbe;

#[async_trait]
impl Probe for FixedProbe {
    async fn measure(&self, _target: &str) -> Result<Metrics, ProbeFailure> {
        Ok(Metrics {
            dns_ms: 1,
            connect_ms: 1,
            tls_ms: 1,
            ttfb_ms: 5,
            total_ms: 6,
        })
    }
}

struct DownBus;

#[async_trait]
impl Bus for DownBus {
    async fn publish(&self, _topic: &str, _payload: String) -> Result<(), BusError> {
        Err(BusError::Disconnected)
    }

    async fn subscribe(&self, _topic: &str, _capacity: usize) -> Result<Subscription, BusError> {
        Err(BusError::Disconnected)
    }
}

fn ping_settings() -> PingSettings {
    PingSettings {
        duration_secs: 2,
        max_duration_secs: 10,
        attempt_timeout_ms: 5000,
        sample_interval_ms: 1000,
        stream_deadline_secs: 15,
        result_buffer: 100,
    }
}

async fn start_worker(bus: &Arc<LocalBus>, name: &str) {
    let sampler = Arc::new(Sampler::new(
        bus.clone(),
        Arc::new(FixedProbe),
        name,
        Duration::from_secs(1),
    ));
    Worker::new(bus.clone(), sampler).start().await.unwrap();
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Decodes every `data:` line of an SSE body.
fn sse_events(body: &[u8]) -> Vec<StreamEvent> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

async fn error_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let app = router(AppState::new(Arc::new(LocalBus::new()), &ping_settings()));
    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_missing_target_is_bad_request() {
    let app = router(AppState::new(Arc::new(LocalBus::new()), &ping_settings()));
    let response = app.oneshot(get("/api/stream")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = error_body(response).await;
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("target"));
}

#[tokio::test]
async fn test_rejected_requests_publish_nothing() {
    let bus = Arc::new(LocalBus::new());
    let mut starts = bus.subscribe(START_TOPIC, 8).await.unwrap();

    for uri in [
        "/api/stream?target=",
        "/api/stream?target=not-a-url",
        "/api/stream?target=https://example.com&duration=0",
        "/api/stream?target=https://example.com&duration=abc",
    ] {
        let app = router(AppState::new(bus.clone(), &ping_settings()));
        let response = app.oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    assert!(
        tokio::time::timeout(Duration::from_millis(20), starts.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_bus_failure_is_internal_error() {
    let app = router(AppState::new(Arc::new(DownBus), &ping_settings()));
    let response = app
        .oneshot(get("/api/stream?target=https://example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_body(response).await["status"], 500);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = router(AppState::new(Arc::new(LocalBus::new()), &ping_settings()));
    let request = Request::builder()
        .uri("/healthz")
        .header(header::ORIGIN, "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test(start_paused = true)]
async fn test_stream_relays_samples_then_completes() {
    let bus = Arc::new(LocalBus::new());
    start_worker(&bus, "w1").await;

    let app = router(AppState::new(bus.clone(), &ping_settings()));
    let response = app
        .oneshot(get("/api/stream?target=https://example.com&duration=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let events = sse_events(&bytes);
    assert_eq!(events.len(), 4);
    assert!(events[3].is_completed());

    let samples: Vec<&PingResult> = events.iter().filter_map(StreamEvent::as_sample).collect();
    assert_eq!(samples.len(), 3);
    let session_id = &samples[0].session_id;
    assert!(session_id.starts_with("req_"));
    assert!(samples.iter().all(|s| &s.session_id == session_id));
    assert!(samples.iter().all(|s| s.worker_id == "w1" && s.success));
}

#[tokio::test(start_paused = true)]
async fn test_stream_fans_in_every_worker() {
    let bus = Arc::new(LocalBus::new());
    start_worker(&bus, "us-east").await;
    start_worker(&bus, "eu-west").await;

    let app = router(AppState::new(bus.clone(), &ping_settings()));
    let response = app
        .oneshot(get("/api/stream?target=http://127.0.0.1:9/"))
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let events = sse_events(&bytes);

    let mut per_worker = std::collections::HashMap::new();
    for sample in events.iter().filter_map(StreamEvent::as_sample) {
        *per_worker.entry(sample.worker_id.clone()).or_insert(0) += 1;
    }
    assert_eq!(per_worker.get("us-east"), Some(&2));
    assert_eq!(per_worker.get("eu-west"), Some(&2));
    assert_eq!(events.iter().filter(|e| e.is_completed()).count(), 1);
    assert!(events.last().unwrap().is_completed());
}

#[tokio::test(start_paused = true)]
async fn test_stream_without_workers_only_completes() {
    let bus = Arc::new(LocalBus::new());
    let app = router(AppState::new(bus.clone(), &ping_settings()));
    let response = app
        .oneshot(get("/api/stream?target=https://example.com"))
        .await
        .unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let events = sse_events(&bytes);
    assert_eq!(events.len(), 1);
    assert!(events[0].is_completed());
}
