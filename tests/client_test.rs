//! Service client behavior against a mock HTTP server.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderValue, USER_AGENT};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lms_interconnect::client::{RequestOptions, ResponseBody, X_REQUEST_ID};
use lms_interconnect::resilience::CircuitState;
use lms_interconnect::{InterconnectError, ServiceClient, UnavailableReason};

mod common;

fn client_for(server: &MockServer, max_retries: u32) -> ServiceClient {
    ServiceClient::new(
        "course",
        &server.uri(),
        common::fast_settings(max_retries, 5, Duration::from_secs(60)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_success_returns_json_and_sends_default_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/courses/7"))
        .and(header("content-type", "application/json"))
        .and(header("user-agent", "LMS-Service-Client/1.0"))
        .and(header_exists(X_REQUEST_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "title": "Rust"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let body = client.get("/api/v1/courses/7").await.unwrap();

    assert_eq!(body, ResponseBody::Json(json!({"id": 7, "title": "Rust"})));
    assert_eq!(client.circuit_breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/courses"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let err = client.get("/api/v1/courses").await.unwrap_err();

    match err {
        InterconnectError::ServiceUnavailable { service, reason } => {
            assert_eq!(service, "course");
            assert_eq!(
                reason,
                UnavailableReason::RetriesExhausted {
                    attempts: 4,
                    last_status: Some(503)
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
    // One failure per logical call, not per attempt.
    assert_eq!(client.circuit_breaker().failure_count(), 1);
}

#[tokio::test]
async fn test_backoff_doubles_between_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let client = ServiceClient::new(
        "progress",
        &server.uri(),
        lms_interconnect::ClientSettings {
            retry: lms_interconnect::resilience::RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(50),
                max_delay: Duration::from_secs(1),
                jitter_ratio: 0.0,
            },
            ..common::fast_settings(2, 5, Duration::from_secs(60))
        },
    )
    .unwrap();

    let start = Instant::now();
    let _ = client.get("/api/v1/progress/1").await;
    // 50ms + 100ms of backoff.
    assert!(start.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_retry_then_success_reuses_request_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let body = client.get("/api/v1/health").await.unwrap();
    assert_eq!(body.into_value(), json!({"status": "ok"}));
    assert_eq!(client.circuit_breaker().failure_count(), 0);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let first_id = requests[0].headers.get(X_REQUEST_ID).unwrap().clone();
    assert!(requests.iter().all(|r| r.headers.get(X_REQUEST_ID) == Some(&first_id)));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/courses/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Course not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let err = client.get("/api/v1/courses/404").await.unwrap_err();

    match &err {
        InterconnectError::Rejected { status, detail, .. } => {
            assert_eq!(*status, 404);
            assert_eq!(detail, "Course not found");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status(), Some(404));
    assert_eq!(client.circuit_breaker().failure_count(), 1);
}

#[tokio::test]
async fn test_client_errors_can_be_excluded_from_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "invalid payload"})))
        .expect(6)
        .mount(&server)
        .await;

    let mut settings = common::fast_settings(3, 5, Duration::from_secs(60));
    settings.failure_policy.trip_on_client_errors = false;
    let client = ServiceClient::new("enrollment", &server.uri(), settings).unwrap();

    for _ in 0..6 {
        let err = client.post("/api/v1/enrollments", json!({})).await.unwrap_err();
        assert_eq!(err.status(), Some(422));
    }
    assert_eq!(client.circuit_breaker().state(), CircuitState::Closed);
    assert_eq!(client.circuit_breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_body_query_and_caller_headers() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/progress/3"))
        .and(query_param("notify", "true"))
        .and(header("user-agent", "progress-worker"))
        .and(header("authorization", "Bearer token"))
        .and(body_json(json!({"percent": 80})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 0);
    let options = RequestOptions::new()
        .json(json!({"percent": 80}))
        .query("notify", true)
        .header(USER_AGENT, HeaderValue::from_static("progress-worker"))
        .header(
            reqwest::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token"),
        );

    let body = client
        .request(reqwest::Method::PUT, "api/v1/progress/3", options)
        .await
        .unwrap();
    assert_eq!(body, ResponseBody::Empty);
}

#[tokio::test]
async fn test_text_body_is_returned_raw() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;

    let client = client_for(&server, 0);
    let body = client.get("/ping").await.unwrap();
    assert_eq!(body, ResponseBody::Text("pong".to_string()));
}

#[tokio::test]
async fn test_malformed_json_is_a_communication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let err = client.get("/api/v1/users/1").await.unwrap_err();
    assert!(matches!(err, InterconnectError::Communication { .. }));
    assert_eq!(client.circuit_breaker().failure_count(), 1);
}

#[tokio::test]
async fn test_typed_response() {
    #[derive(serde::Deserialize)]
    struct User {
        id: i64,
        email: String,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "email": "a@b.c"})))
        .mount(&server)
        .await;

    let client = client_for(&server, 0);
    let user: User = client.get_json("/api/v1/users/5").await.unwrap();
    assert_eq!(user.id, 5);
    assert_eq!(user.email, "a@b.c");
}

#[tokio::test]
async fn test_timeouts_are_retried_like_connection_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok"}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let settings = lms_interconnect::ClientSettings {
        timeout: Duration::from_millis(100),
        ..common::fast_settings(2, 5, Duration::from_secs(60))
    };
    let client = ServiceClient::new("assessment", &server.uri(), settings).unwrap();
    let err = client.get("/api/v1/assessments/2").await.unwrap_err();

    match err {
        InterconnectError::ServiceUnavailable { reason, .. } => assert_eq!(
            reason,
            UnavailableReason::RetriesExhausted {
                attempts: 3,
                last_status: None
            }
        ),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.circuit_breaker().failure_count(), 1);
}
