//! Completion client tests against a stub HTTP upstream: request shape,
//! reply trimming, and the failure taxonomy (status, malformed, missing
//! choices, timeout).

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use lib::completion::{CompletionClient, CompletionError};
use lib::config::CompletionConfig;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded upstream request: Authorization header and JSON body.
struct RecordedRequest {
    authorization: Option<String>,
    body: serde_json::Value,
}

/// Stub completion upstream: records every request and answers per `mode`.
#[derive(Clone)]
struct Upstream {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    mode: UpstreamMode,
}

#[derive(Clone)]
enum UpstreamMode {
    /// 200 with the given JSON body.
    Fixed(serde_json::Value),
    /// HTTP 500.
    Fail,
    /// 200 with a body that is not JSON.
    Malformed,
    /// Sleep past any client timeout, then 200.
    Slow,
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    upstream.requests.lock().unwrap().push(RecordedRequest {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });
    match upstream.mode {
        UpstreamMode::Fixed(ref v) => Json(v.clone()).into_response(),
        UpstreamMode::Fail => {
            (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
        }
        UpstreamMode::Malformed => "this is not json".into_response(),
        UpstreamMode::Slow => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(serde_json::json!({ "choices": [ { "text": "too late" } ] })).into_response()
        }
    }
}

/// Spawn the stub on a free loopback port; returns the port and the request log.
async fn spawn_upstream(mode: UpstreamMode) -> (u16, Arc<Mutex<Vec<RecordedRequest>>>) {
    let upstream = Upstream {
        requests: Arc::new(Mutex::new(Vec::new())),
        mode,
    };
    let requests = upstream.requests.clone();
    let app = Router::new()
        .route("/completions", post(completions))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let port = listener.local_addr().expect("local_addr").port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (port, requests)
}

fn client_for(port: u16, api_key: Option<&str>) -> CompletionClient {
    let config = CompletionConfig {
        endpoint: format!("http://127.0.0.1:{}/completions", port),
        timeout_secs: 1,
        ..CompletionConfig::default()
    };
    CompletionClient::new(&config, api_key.map(String::from))
}

#[tokio::test]
async fn complete_posts_prompt_token_cap_and_bearer_credential() {
    let (port, requests) = spawn_upstream(UpstreamMode::Fixed(
        serde_json::json!({ "choices": [ { "text": " Hi there! " } ] }),
    ))
    .await;
    let client = client_for(port, Some("test-key"));

    let reply = client.complete("Hello").await.expect("complete");
    assert_eq!(reply, "Hi there!");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.authorization.as_deref(), Some("Bearer test-key"));
    assert_eq!(req.body.get("prompt").and_then(|v| v.as_str()), Some("Hello"));
    assert_eq!(req.body.get("max_tokens").and_then(|v| v.as_u64()), Some(50));
}

#[tokio::test]
async fn complete_without_credential_omits_authorization() {
    let (port, requests) = spawn_upstream(UpstreamMode::Fixed(
        serde_json::json!({ "choices": [ { "text": "ok" } ] }),
    ))
    .await;
    let client = client_for(port, None);
    assert!(!client.has_credential());

    client.complete("Hello").await.expect("complete");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].authorization.is_none());
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let (port, _requests) = spawn_upstream(UpstreamMode::Fail).await;
    let client = client_for(port, None);

    let err = client.complete("Hello").await.expect_err("must fail");
    assert!(matches!(err, CompletionError::Api(_)));
    assert_eq!(err.kind(), "status");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let (port, _requests) = spawn_upstream(UpstreamMode::Malformed).await;
    let client = client_for(port, None);

    let err = client.complete("Hello").await.expect_err("must fail");
    assert_eq!(err.kind(), "malformed");
}

#[tokio::test]
async fn missing_or_empty_choices_is_no_choices() {
    for body in [
        serde_json::json!({}),
        serde_json::json!({ "choices": [] }),
        serde_json::json!({ "choices": [ {} ] }),
    ] {
        let (port, _requests) = spawn_upstream(UpstreamMode::Fixed(body)).await;
        let client = client_for(port, None);

        let err = client.complete("Hello").await.expect_err("must fail");
        assert!(matches!(err, CompletionError::NoChoices));
        assert_eq!(err.kind(), "malformed");
    }
}

#[tokio::test]
async fn slow_upstream_surfaces_as_timeout() {
    let (port, _requests) = spawn_upstream(UpstreamMode::Slow).await;
    let client = client_for(port, None);

    let err = client.complete("Hello").await.expect_err("must fail");
    assert_eq!(err.kind(), "timeout");
}
