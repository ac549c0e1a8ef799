//! Gemini provider against a mockito server.

use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;
use wellness_ai_gateway::{
    CallRequest, ErrorKind, Gateway, GatewayConfig, GeminiProvider, OperationKey, Provider, ProviderError, Reply,
};

const PATH: &str = "/models/test-model:generateContent";

fn config() -> GatewayConfig {
    GatewayConfig::new()
        .with_api_key("test-key")
        .with_text_model("test-model")
        .with_vision_model("test-vision")
        .with_request_timeout(Duration::from_secs(5))
        .with_max_retries(1)
}

fn provider(url: &str) -> GeminiProvider {
    GeminiProvider::from_config(&config())
        .unwrap()
        .with_base_url(url)
        .unwrap()
}

fn candidate(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

#[tokio::test]
async fn text_generation_round_trip() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_header("x-goog-api-key", "test-key")
        .match_header("x-request-id", Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "contents": [{ "parts": [{ "text": "hello" }] }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(candidate("hi there"))
        .create_async()
        .await;

    let out = provider(&server.url()).generate_text("hello", None).await.unwrap();
    assert_eq!(out, "hi there");
    mock.assert_async().await;
}

#[tokio::test]
async fn structured_request_carries_schema() {
    let mut server = Server::new_async().await;
    let schema = json!({ "type": "object", "properties": { "summary": { "type": "string" } } });
    let mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema.clone()
            }
        })))
        .with_status(200)
        .with_body(candidate("{\"summary\": \"ok\"}"))
        .create_async()
        .await;

    let out = provider(&server.url())
        .generate_text("summarize", Some(&schema))
        .await
        .unwrap();
    assert_eq!(out, "{\"summary\": \"ok\"}");
    mock.assert_async().await;
}

#[tokio::test]
async fn vision_request_inlines_base64_image() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/models/test-vision:generateContent")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "contents": [{ "parts": [
                { "text": "describe" },
                { "inline_data": { "mime_type": "image/png", "data": "AQID" } }
            ] }]
        })))
        .with_status(200)
        .with_body(candidate("a small drawing"))
        .create_async()
        .await;

    let out = provider(&server.url())
        .describe_image(vec![1u8, 2, 3].into(), "image/png", "describe")
        .await
        .unwrap();
    assert_eq!(out, "a small drawing");
    mock.assert_async().await;
}

#[tokio::test]
async fn error_status_keeps_provider_message() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(json!({ "error": { "code": 429, "message": "Resource has been exhausted" } }).to_string())
        .create_async()
        .await;

    let err = provider(&server.url()).generate_text("hello", None).await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Status {
            status: 429,
            message: "Resource has been exhausted".into()
        }
    );
}

#[tokio::test]
async fn blocked_candidate_is_content_blocked() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "candidates": [{ "finishReason": "SAFETY" }] }).to_string())
        .create_async()
        .await;

    let err = provider(&server.url()).generate_text("hello", None).await.unwrap_err();
    assert!(matches!(err, ProviderError::ContentBlocked(_)));
}

#[tokio::test]
async fn gateway_over_gemini_maps_auth_failure_to_config() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(json!({ "error": { "message": "API key not valid" } }).to_string())
        .expect(1)
        .create_async()
        .await;

    let gateway = Gateway::builder()
        .with_config(&config().with_max_retries(3))
        .with_base_url(server.url())
        .build()
        .unwrap();
    let key = OperationKey::from("test-model:text:answer_question");
    let err = gateway.call(&key, CallRequest::text("hello")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    mock.assert_async().await;
}

#[tokio::test]
async fn gateway_over_gemini_repairs_fenced_json() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(candidate("```json\n{\"safe\": true, \"reason\": \"kind\",}\n```"))
        .create_async()
        .await;

    let gateway = Gateway::builder()
        .with_config(&config())
        .with_base_url(server.url())
        .build()
        .unwrap();
    let key = OperationKey::from("test-model:text:moderate_peer_post");
    let reply = gateway
        .call(&key, CallRequest::text("post").with_schema(json!({ "type": "object" })))
        .await
        .unwrap();
    assert_eq!(reply, Reply::Json(json!({ "safe": true, "reason": "kind" })));
}

#[tokio::test]
async fn transport_failures_never_echo_the_api_key() {
    let cfg = config().with_api_key("SECRET-KEY-123");
    let provider = GeminiProvider::from_config(&cfg)
        .unwrap()
        .with_base_url("http://127.0.0.1:1")
        .unwrap();
    let err = provider.generate_text("hello", None).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
    assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);

    let gateway = Gateway::builder()
        .with_config(&cfg)
        .with_base_url("http://127.0.0.1:1")
        .build()
        .unwrap();
    let key = OperationKey::from("test-model:text:answer_question");
    let err = gateway.call(&key, CallRequest::text("hello")).await.unwrap_err();
    assert!(!err.to_string().contains("SECRET-KEY-123"), "{}", err);
    assert!(!format!("{:?}", err).contains("SECRET-KEY-123"));
}

#[test]
fn missing_api_key_is_a_config_error() {
    let err = GeminiProvider::from_config(&GatewayConfig::new()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Config);
}
