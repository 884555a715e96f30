// triage-classifier-rs/src/tests.rs
// HTTP-level tests for the completion client against a mock provider

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use shared_types::Priority;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::{
    build_classification_request, Classifier, ClassifierConfig, CompletionConfig,
    CompletionError, CompletionProvider, CompletionRequest, OpenAiCompletionClient,
};

fn chat_response(content: Value) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content.to_string(), "refusal": null},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 120, "completion_tokens": 18, "total_tokens": 138}
    })
}

fn client_for(server: &MockServer, max_retries: u32) -> OpenAiCompletionClient {
    let config = CompletionConfig {
        max_retries,
        timeout: Duration::from_secs(2),
        initial_retry_delay: Duration::from_millis(10),
        max_retry_delay: Duration::from_millis(20),
        ..CompletionConfig::default()
    }
    .with_api_key("test-key")
    .with_api_url(format!("{}/v1/chat/completions", server.uri()));

    OpenAiCompletionClient::new(config).unwrap()
}

fn request() -> CompletionRequest {
    CompletionRequest::from_classification(
        build_classification_request("Checkout down", "Every payment returns 500"),
        0.3,
    )
}

#[tokio::test]
async fn test_structured_output_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_schema", "json_schema": {"strict": true}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!({
            "priority": "high",
            "explanation": "Payments fail for all customers with no workaround."
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let value = client_for(&server, 1).complete(&request()).await.unwrap();
    assert_eq!(value["priority"], json!("high"));
}

#[tokio::test]
async fn test_overlong_explanation_is_a_schema_violation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(json!({
            "priority": "low",
            "explanation": "x".repeat(201)
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, 1).complete(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::SchemaViolation(_)));
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, 1).complete(&request()).await.unwrap_err();
    assert_eq!(
        err,
        CompletionError::Provider {
            status: 500,
            body: "upstream exploded".to_string()
        }
    );
}

#[tokio::test]
async fn test_timeout_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response(json!({"priority": "low", "explanation": "late"})))
                .set_delay(Duration::from_secs(5)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let err = client_for(&server, 1).complete(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Timeout(_)));
}

#[tokio::test]
async fn test_zero_retries_means_a_single_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_response(json!({"priority": "low", "explanation": "late"})))
                .set_delay(Duration::from_secs(5)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server, 0).complete(&request()).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_refusal_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null, "refusal": "I can't help with that."},
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server, 1).complete(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Refused(_)));
}

#[tokio::test]
async fn test_classifier_falls_back_when_provider_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let classifier = Classifier::new(
        Arc::new(client_for(&server, 1)),
        ClassifierConfig::default(),
    );
    let outcome = classifier.classify("Checkout down", "").await;

    assert!(outcome.is_degraded());
    assert_eq!(outcome.result().priority, Priority::Medium);
    assert_eq!(outcome.result().explanation, "Analysis unavailable");
}
