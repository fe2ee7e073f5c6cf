//! Integration tests for `FetchClient` using wiremock HTTP mocks.

use stagesignal_fetch::{ErrorCategory, FetchClient, RetryPolicy, RobotsPolicy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

fn test_client() -> FetchClient {
    // Zero politeness and zero backoff so tests run fast.
    FetchClient::new(
        "stagesignal-test/0.1",
        5,
        (0, 0),
        RetryPolicy {
            max_attempts: 3,
            backoff_base_ms: 0,
            max_backoff_ms: 0,
        },
    )
    .expect("client construction should not fail")
}

/// Responds 429 for the first `fail_count` requests, then 200.
struct FlakyResponder {
    fail_count: u32,
    hits: std::sync::atomic::AtomicU32,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(429)
        } else {
            ResponseTemplate::new(200).set_body_string("{\"ok\":true}")
        }
    }
}

#[tokio::test]
async fn success_returns_body_and_attempt_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let client = test_client();
    let response = client
        .fetch(&format!("{}/api/data", server.uri()))
        .await
        .expect("fetch should succeed");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "hello");
    assert_eq!(response.attempts, 1);
}

#[tokio::test]
async fn rate_limited_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(FlakyResponder {
            fail_count: 2,
            hits: std::sync::atomic::AtomicU32::new(0),
        })
        .mount(&server)
        .await;

    let client = test_client();
    let response = client
        .fetch(&format!("{}/api/flaky", server.uri()))
        .await
        .expect("should succeed after retries");

    assert_eq!(response.attempts, 3);
}

#[tokio::test]
async fn server_error_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client();
    let err = client
        .fetch(&format!("{}/api/broken", server.uri()))
        .await
        .expect_err("should fail after retries");

    assert_eq!(err.category, ErrorCategory::ServerError);
    assert_eq!(err.attempts, 3);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client();
    let err = client
        .fetch(&format!("{}/api/missing", server.uri()))
        .await
        .expect_err("404 should be terminal");

    assert_eq!(err.category, ErrorCategory::ClientError);
    assert_eq!(err.attempts, 1);
}

#[tokio::test]
async fn robots_disallow_blocks_without_any_request() {
    let server = MockServer::start().await;
    // The disallowed endpoint must never be hit.
    Mock::given(method("GET"))
        .and(path("/private/data"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client();
    client
        .preload_robots(
            &server.uri(),
            RobotsPolicy::parse("User-agent: *\nDisallow: /private/\n"),
        )
        .await;

    let err = client
        .fetch(&format!("{}/private/data", server.uri()))
        .await
        .expect_err("robots disallow must block");

    assert_eq!(err.category, ErrorCategory::RobotsBlocked);
    assert_eq!(err.attempts, 0);
}

#[tokio::test]
async fn robots_fetched_once_per_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow:\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/b"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = test_client();
    client.fetch(&format!("{}/api/a", server.uri())).await.unwrap();
    client.fetch(&format!("{}/api/b", server.uri())).await.unwrap();
}

#[tokio::test]
async fn fetch_safe_suppresses_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let client = test_client();
    assert!(client
        .fetch_safe(&format!("{}/api/gone", server.uri()))
        .await
        .is_none());
}

#[tokio::test]
async fn truncated_body_is_a_retriable_network_error() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // A server that promises 100 body bytes and hangs up after 7.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                .await;
        }
    });

    let client = test_client().without_robots();
    let err = client
        .fetch(&format!("http://{addr}/file"))
        .await
        .expect_err("truncated body must not read as success");

    assert_eq!(err.category, ErrorCategory::Network);
    assert_eq!(err.attempts, 3);
}

#[tokio::test]
async fn inverted_politeness_window_still_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/data"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    // min > max gets normalized rather than panicking in the delay sampler.
    let client = FetchClient::new(
        "stagesignal-test/0.1",
        5,
        (50, 10),
        RetryPolicy {
            max_attempts: 1,
            backoff_base_ms: 0,
            max_backoff_ms: 0,
        },
    )
    .unwrap();
    let response = client
        .fetch(&format!("{}/api/data", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn without_robots_skips_the_consult() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sanctioned"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = test_client().without_robots();
    let response = client
        .fetch(&format!("{}/api/sanctioned", server.uri()))
        .await
        .unwrap();
    assert_eq!(response.body, "ok");
}
