//! End-to-end tests: real router on an ephemeral port, upstream mocked.

use chat_proxy::{router, AppState, ProxyConfig};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

/// Serve `config` on 127.0.0.1:<random> and return its base URL
async fn spawn_proxy(config: ProxyConfig) -> String {
    let state = Arc::new(AppState::new(config).unwrap());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    format!("http://{}", addr)
}

fn openai_config(upstream: &MockServer, key: Option<&str>) -> ProxyConfig {
    ProxyConfig::openai(key.map(String::from)).with_base_url(upstream.base_url())
}

#[tokio::test]
async fn test_root_is_alive_without_credentials() {
    let upstream = MockServer::start_async().await;
    let base = spawn_proxy(openai_config(&upstream, None)).await;

    let resp = reqwest::get(format!("{}/", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Chatbot server is running");
}

#[tokio::test]
async fn test_health_shape() {
    let upstream = MockServer::start_async().await;
    let base = spawn_proxy(openai_config(&upstream, Some("sk-test"))).await;

    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["apiKeyConfigured"], true);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_chat_relays_canned_reply() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "model": "gpt-3.5-turbo",
                "choices": [{"message": {"role": "assistant", "content": "canned text"}}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
            }));
        })
        .await;
    let base = spawn_proxy(openai_config(&upstream, Some("sk-test"))).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({"messages": [{"role": "user", "content": "hello"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reply"], "canned text");
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["usage"]["total_tokens"], 3);
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_chat_empty_messages_is_400() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|_when, then| {
            then.status(200);
        })
        .await;
    let base = spawn_proxy(openai_config(&upstream, Some("sk-test"))).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({"messages": []}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["error"],
        "messages (array) is required in the request body"
    );
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_chat_without_credential_is_500() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|_when, then| {
            then.status(200);
        })
        .await;
    let base = spawn_proxy(openai_config(&upstream, None)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({"messages": [{"role": "user", "content": "hello"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Server not configured: OPENAI_API_KEY missing");
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_chat_upstream_failure_keeps_status() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(503).body("overloaded");
        })
        .await;
    let base = spawn_proxy(openai_config(&upstream, Some("sk-test"))).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({"messages": [{"role": "user", "content": "hello"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "OpenAI API returned an error");
    assert_eq!(body["details"], "overloaded");
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_chat_invalid_json_is_400() {
    let upstream = MockServer::start_async().await;
    let base = spawn_proxy(openai_config(&upstream, Some("sk-test"))).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "request body must be valid JSON");
}

#[tokio::test]
async fn test_chat_untyped_body_without_credential_is_500() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|_when, then| {
            then.status(200);
        })
        .await;
    let base = spawn_proxy(openai_config(&upstream, None)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .body(r#"{"messages": [{"role": "user", "content": "hello"}]}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Server not configured: OPENAI_API_KEY missing");
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_chat_text_body_is_missing_messages() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|_when, then| {
            then.status(200);
        })
        .await;
    let base = spawn_proxy(openai_config(&upstream, Some("sk-test"))).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .header("content-type", "text/plain")
        .body(r#"{"messages": [{"role": "user", "content": "hello"}]}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["error"],
        "messages (array) is required in the request body"
    );
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_chat_body_limit() {
    let upstream = MockServer::start_async().await;
    let mock = upstream
        .mock_async(|_when, then| {
            then.status(200);
        })
        .await;
    let config = ProxyConfig {
        max_body_bytes: 1024,
        ..openai_config(&upstream, Some("sk-test"))
    };
    let base = spawn_proxy(config).await;

    let huge = "x".repeat(4 * 1024);
    let resp = reqwest::Client::new()
        .post(format!("{}/chat", base))
        .json(&json!({"messages": [{"role": "user", "content": huge}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "request body too large");
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_cors_preflight_allows_any_origin() {
    let upstream = MockServer::start_async().await;
    let base = spawn_proxy(openai_config(&upstream, Some("sk-test"))).await;

    let resp = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/chat", base))
        .header("origin", "https://example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
