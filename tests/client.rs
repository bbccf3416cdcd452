//! End-to-end tests against a local axum echo server and mockito.

use axum::{
    body::Bytes,
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    routing::any,
    Router,
};
use courier_http::{
    Client, Context, Error, ErrorCheck, Form, Payload, RequestOption,
};
use std::collections::BTreeMap;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Echoes the body and content type, and reports the raw query.
async fn echo(uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_owned();
    let query = uri.query().unwrap_or_default().to_owned();
    (
        [
            (header::CONTENT_TYPE.as_str(), content_type),
            ("x-echo-query", query),
        ],
        body,
    )
}

async fn fail() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/echo", any(echo))
        .route("/error", any(fail));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fast_client(retry_max: u32) -> Client {
    Client::builder()
        .retry_limit(retry_max, Duration::from_millis(1), Duration::from_millis(10))
        .timeout(Duration::from_secs(5))
        .logging(true)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_merges_query() {
    init_tracing();
    let addr = spawn_server().await;
    let client = fast_client(0);
    let query = Form::new().with("k2", "v2");

    let response = client
        .get(
            &Context::background(),
            &format!("http://{addr}/echo?k1=v1"),
            Some(&query),
            &[],
        )
        .await
        .check_status(&[200])
        .await;

    assert!(response.err().is_none());
    assert_eq!(
        response.url().map(|u| u.as_str().to_owned()),
        Some(format!("http://{addr}/echo?k1=v1&k2=v2"))
    );
    let echoed = response
        .headers()
        .and_then(|h| h.get("x-echo-query"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    assert_eq!(echoed.as_deref(), Some("k1=v1&k2=v2"));
}

#[tokio::test]
async fn test_post_json_round_trips_through_echo() {
    init_tracing();
    let addr = spawn_server().await;
    let client = fast_client(0);

    let response = client
        .post(
            &Context::background(),
            &format!("http://{addr}/echo"),
            serde_json::json!({"a": "b"}),
            &[],
        )
        .await
        .check_status(&[200])
        .await;

    let content_type = response
        .headers()
        .and_then(|h| h.get(header::CONTENT_TYPE))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    assert_eq!(content_type.as_deref(), Some("application/json"));

    let echoed: BTreeMap<String, String> = response.unmarshal_body_json().await.unwrap();
    assert_eq!(echoed.get("a").map(String::as_str), Some("b"));
}

#[tokio::test]
async fn test_post_form() {
    init_tracing();
    let addr = spawn_server().await;
    let client = fast_client(0);
    let form: Form = [("k", "v")].into();

    let response = client
        .post_form(&Context::background(), &format!("http://{addr}/echo"), form, &[])
        .await;

    let content_type = response
        .headers()
        .and_then(|h| h.get(header::CONTENT_TYPE))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    assert_eq!(
        content_type.as_deref(),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(response.text().await.unwrap(), "k=v");
}

#[tokio::test]
async fn test_raw_bytes_are_sniffed() {
    init_tracing();
    let addr = spawn_server().await;
    let client = fast_client(0);

    let response = client
        .post(
            &Context::background(),
            &format!("http://{addr}/echo"),
            Payload::from(b"%PDF-1.7 minimal".to_vec()),
            &[],
        )
        .await;

    let content_type = response
        .headers()
        .and_then(|h| h.get(header::CONTENT_TYPE))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn test_unexpected_status_keeps_client_usable() {
    init_tracing();
    let addr = spawn_server().await;
    let client = fast_client(1);
    let ctx = Context::background();

    let response = client
        .get(&ctx, &format!("http://{addr}/error"), None, &[])
        .await
        .check_status(&[200])
        .await;
    match response.err() {
        Some(Error::UnexpectedStatus(err)) => {
            assert_eq!(err.code, 500);
            assert_eq!(&err.body[..], b"boom");
            assert!(err.to_string().starts_with("unexpected HTTP status: 500"));
        }
        other => panic!("expected unexpected-status error, got {other:?}"),
    }

    let text = client
        .post(&ctx, &format!("http://{addr}/echo"), "again", &[])
        .await
        .check_status(&[200])
        .await
        .text()
        .await
        .unwrap();
    assert_eq!(text, "again");
}

#[tokio::test]
async fn test_check_head_ok() {
    init_tracing();
    let addr = spawn_server().await;
    let client = fast_client(0);
    let ctx = Context::background();

    assert!(client.check_head_ok(&ctx, &format!("http://{addr}/echo")).await);
    assert!(!client.check_head_ok(&ctx, &format!("http://{addr}/missing")).await);
}

#[tokio::test]
async fn test_unreachable_host_respects_deadline() {
    init_tracing();
    let client = fast_client(5);
    let ctx = Context::background().with_timeout(Duration::from_millis(500));
    let started = Instant::now();

    let response = client
        .get(&ctx, "http://10.255.255.1:81/", None, &[])
        .await;

    assert!(response.err().is_some());
    // deadline plus one capped backoff wait, with scheduling slack
    assert!(started.elapsed() < Duration::from_millis(500 + 10 + 1000));
}

#[tokio::test]
async fn test_cancelled_context_sends_nothing() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/never")
        .expect(0)
        .create_async()
        .await;

    let (ctx, _token) = Context::background().with_cancel();
    ctx.cancel();
    let response = fast_client(3)
        .get(&ctx, &format!("{}/never", server.url()), None, &[])
        .await;

    assert!(matches!(response.err(), Some(Error::Cancelled)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_retries_until_limit() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/flaky")
        .with_status(503)
        .with_body("unavailable")
        .expect(4)
        .create_async()
        .await;

    let response = fast_client(3)
        .get(&Context::background(), &format!("{}/flaky", server.url()), None, &[])
        .await;

    assert_eq!(response.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_not_implemented_is_not_retried() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/feature")
        .with_status(501)
        .expect(1)
        .create_async()
        .await;

    let response = fast_client(3)
        .put(
            &Context::background(),
            &format!("{}/feature", server.url()),
            "data",
            &[],
        )
        .await
        .check_status(&[200, 204])
        .await;

    assert_eq!(response.err().and_then(Error::status), Some(StatusCode::NOT_IMPLEMENTED));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_request_options_set_headers() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/items/1")
        .match_header("authorization", "Bearer secret")
        .match_header("x-request-id", "abc-123")
        .with_status(204)
        .create_async()
        .await;

    let response = fast_client(0)
        .delete(
            &Context::background(),
            &format!("{}/items/1", server.url()),
            &[
                RequestOption::bearer_auth("secret"),
                RequestOption::header("X-Request-Id", "abc-123"),
            ],
        )
        .await
        .check_status(&[204])
        .await;

    assert!(response.err().is_none());
    mock.assert_async().await;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    value: Option<u32>,
}

impl ErrorCheck for Envelope {
    fn check(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match &self.error {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

#[tokio::test]
async fn test_embedded_error_surfaces() {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/ok")
        .with_header("content-type", "application/json")
        .with_body(r#"{"value": 7}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/denied")
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "denied"}"#)
        .create_async()
        .await;
    let client = fast_client(0);
    let ctx = Context::background();

    let ok: Envelope = client
        .get(&ctx, &format!("{}/ok", server.url()), None, &[])
        .await
        .unmarshal_body_json_checked()
        .await
        .unwrap();
    assert_eq!(ok.value, Some(7));

    let denied = client
        .get(&ctx, &format!("{}/denied", server.url()), None, &[])
        .await
        .unmarshal_body_json_checked::<Envelope>()
        .await;
    match denied {
        Err(Error::Application(err)) => assert_eq!(err.to_string(), "denied"),
        other => panic!("expected application error, got {other:?}"),
    }
}

#[test]
fn test_shared_client_blocks_on_runtime() {
    let client = Client::shared();
    let response = tokio_test::block_on(client.get(
        &Context::background(),
        "not a url",
        None,
        &[],
    ));
    assert!(matches!(response.err(), Some(Error::InvalidUrl(_))));
}
