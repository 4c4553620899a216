//! Tests for request execution: retries, backoff, timeouts and classification.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::Instant;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cineverse_client::config::CineConfig;
use cineverse_client::error::{CineError, ErrorKind};
use cineverse_client::executor::RequestExecutor;
use cineverse_client::request::RequestDescriptor;
use cineverse_client::transport::HttpTransport;

use common::{test_config, MockBackend, Step};

fn executor(backend: &Arc<MockBackend>) -> RequestExecutor {
    RequestExecutor::from_config(&test_config(), backend.clone())
}

fn gaps(backend: &MockBackend) -> Vec<Duration> {
    let requests = backend.requests();
    requests
        .windows(2)
        .map(|pair| pair[1].at.duration_since(pair[0].at))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn transient_failures_within_budget_return_the_last_success() {
    let backend = MockBackend::new();
    backend.on(
        "/movies/",
        [
            Step::status(503, "waking up"),
            Step::network(),
            Step::ok(r#"{"items": [1, 2]}"#),
        ],
    );
    let executor = executor(&backend);

    let payload = executor
        .execute(&RequestDescriptor::get("/movies/"), 3)
        .await
        .unwrap();

    assert_eq!(payload, json!({"items": [1, 2]}));
    assert_eq!(backend.total_calls(), 3);
    assert_eq!(gaps(&backend), vec![Duration::from_secs(1), Duration::from_secs(2)]);
}

#[tokio::test(start_paused = true)]
async fn three_transient_failures_exhaust_a_budget_of_three() {
    let backend = MockBackend::new();
    backend.on("/movies/", [Step::status(500, "boom")]);
    let executor = executor(&backend);
    let started = Instant::now();

    let err = executor
        .execute(&RequestDescriptor::get("/movies/"), 3)
        .await
        .unwrap_err();

    match err {
        CineError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, CineError::Server { status: 500, .. }));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    assert_eq!(backend.total_calls(), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3100), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn attempts_never_exceed_the_budget() {
    let backend = MockBackend::new();
    backend.on("/movies/", [Step::network()]);
    let executor = executor(&backend);

    let err = executor
        .execute(&RequestDescriptor::get("/movies/"), 2)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
    assert_eq!(backend.total_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_and_caps_at_ten_seconds() {
    let backend = MockBackend::new();
    backend.on("/movies/", [Step::status(502, "bad gateway")]);
    let executor = executor(&backend);

    let _ = executor.execute(&RequestDescriptor::get("/movies/"), 6).await;

    let expected: Vec<Duration> = [1, 2, 4, 8, 10]
        .into_iter()
        .map(Duration::from_secs)
        .collect();
    assert_eq!(gaps(&backend), expected);
}

#[tokio::test(start_paused = true)]
async fn first_attempt_gets_ninety_seconds_and_retries_thirty() {
    let backend = MockBackend::new();
    backend.on("/movies/", [Step::Hang]);
    let executor = executor(&backend);
    let started = Instant::now();

    let err = executor
        .execute(&RequestDescriptor::get("/movies/"), 3)
        .await
        .unwrap_err();

    match err {
        CineError::RetriesExhausted { last, .. } => {
            assert!(matches!(*last, CineError::Timeout(30_000)));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    // 90s + 1s backoff + 30s + 2s backoff + 30s
    assert_eq!(
        gaps(&backend),
        vec![Duration::from_secs(91), Duration::from_secs(32)]
    );
    assert_eq!(started.elapsed(), Duration::from_secs(153));
}

#[tokio::test(start_paused = true)]
async fn slow_cold_start_within_the_first_timeout_succeeds_without_retry() {
    let backend = MockBackend::new();
    backend.on(
        "/movies/",
        [Step::RespondAfter(
            Duration::from_secs(60),
            200,
            r#"{"items": []}"#.to_string(),
        )],
    );
    let executor = executor(&backend);

    let payload = executor
        .execute(&RequestDescriptor::get("/movies/"), 3)
        .await
        .unwrap();

    assert_eq!(payload, json!({"items": []}));
    assert_eq!(backend.total_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_terminal() {
    let backend = MockBackend::new();
    backend.on(
        "/movies/999",
        [Step::status(404, r#"{"detail": "Movie not found"}"#)],
    );
    let executor = executor(&backend);

    let err = executor
        .execute(&RequestDescriptor::get("/movies/999"), 3)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Client error (status 404): Movie not found");
    assert_eq!(backend.total_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn malformed_payloads_are_terminal() {
    let backend = MockBackend::new();
    backend.on("/movies/", [Step::ok("<!doctype html>")]);
    let executor = executor(&backend);

    let err = executor
        .execute(&RequestDescriptor::get("/movies/"), 3)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ParseError);
    assert_eq!(backend.total_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn backend_ready_flips_on_first_success_only() {
    let backend = MockBackend::new();
    backend.on("/movies/", [Step::status(400, r#"{"detail": "bad"}"#), Step::ok("{}")]);
    let executor = executor(&backend);

    assert!(!executor.backend_ready());
    let _ = executor.execute(&RequestDescriptor::get("/movies/"), 1).await;
    assert!(!executor.backend_ready());
    executor
        .execute(&RequestDescriptor::get("/movies/"), 1)
        .await
        .unwrap();
    assert!(executor.backend_ready());
}

#[tokio::test(start_paused = true)]
async fn zero_budget_is_rejected_without_network() {
    let backend = MockBackend::new();
    let executor = executor(&backend);

    let err = executor
        .execute(&RequestDescriptor::get("/movies/"), 0)
        .await
        .unwrap_err();

    assert!(matches!(err, CineError::InvalidArgument(_)));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn reads_never_send_a_body() {
    let backend = MockBackend::new();
    let executor = executor(&backend);

    executor
        .execute(
            &RequestDescriptor::get("/movies/").json_body(json!({"ignored": true})),
            1,
        )
        .await
        .unwrap();
    executor
        .execute(&RequestDescriptor::post("/movies/").json_body(json!({"title": "Heat"})), 1)
        .await
        .unwrap();

    let requests = backend.requests();
    assert_eq!(requests[0].body, None);
    assert_eq!(requests[1].body.as_deref(), Some(r#"{"title":"Heat"}"#));
}

fn http_executor(server: &MockServer) -> RequestExecutor {
    let config = CineConfig::builder()
        .base_url(server.uri())
        .backoff_base(Duration::from_millis(10))
        .backoff_cap(Duration::from_millis(20))
        .build();
    RequestExecutor::from_config(&config, Arc::new(HttpTransport::new().unwrap()))
}

#[tokio::test]
async fn http_requests_carry_json_and_bearer_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/movies/42/rate"))
        .and(query_param("rating", "5"))
        .and(header("authorization", "Bearer secret-token"))
        .and(header("content-type", "application/json"))
        .and(header_exists("x-request-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Rating recorded successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payload = http_executor(&server)
        .execute(
            &RequestDescriptor::post("/movies/42/rate")
                .query("rating", 5u32)
                .bearer("secret-token"),
            3,
        )
        .await
        .unwrap();

    assert_eq!(payload["status"], "success");
}

#[tokio::test]
async fn http_json_bodies_are_sent_for_mutations() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/auth/me"))
        .and(body_json(json!({"username": "neo", "email": "neo@example.test"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let payload = http_executor(&server)
        .execute(
            &RequestDescriptor::put("/auth/me")
                .json_body(json!({"username": "neo", "email": "neo@example.test"})),
            1,
        )
        .await
        .unwrap();

    assert_eq!(payload, json!({"id": 1}));
}

#[tokio::test]
async fn http_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movies/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movies/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let payload = http_executor(&server)
        .execute(&RequestDescriptor::get("/movies/"), 3)
        .await
        .unwrap();

    assert_eq!(payload, json!({"items": []}));
}

#[tokio::test]
async fn http_client_error_detail_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/movies/42/rate"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"detail": "Rating must be between 1 and 5"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = http_executor(&server)
        .execute(&RequestDescriptor::post("/movies/42/rate").query("rating", 9u32), 3)
        .await
        .unwrap_err();

    match err {
        CineError::Client { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "Rating must be between 1 and 5");
        }
        other => panic!("expected client error, got {other:?}"),
    }
}

#[tokio::test]
async fn http_unreachable_backend_is_a_network_failure() {
    // Nothing listens on port 9 of localhost in the test environment.
    let config = CineConfig::builder()
        .base_url("http://127.0.0.1:9")
        .backoff_base(Duration::from_millis(1))
        .backoff_cap(Duration::from_millis(1))
        .build();
    let executor = RequestExecutor::from_config(&config, Arc::new(HttpTransport::new().unwrap()));

    let err = executor
        .execute(&RequestDescriptor::get("/health"), 2)
        .await
        .unwrap_err();

    match err {
        CineError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert_eq!(last.kind(), ErrorKind::Transient);
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
}
