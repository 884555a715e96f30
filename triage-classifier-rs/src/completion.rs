// triage-classifier-rs/src/completion.rs
//
// Completion Client for structured (schema-constrained) LLM output
//
// This module provides:
// - The `CompletionProvider` seam the result handler calls through
// - An OpenAI-compatible implementation using the `json_schema` response format
// - Validation of the returned object against the declared schema, so a
//   successful result always satisfies it
// - One jittered retry on transport failures; HTTP, refusal and schema
//   failures are never retried

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use jsonschema::{Draft, JSONSchema};
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CompletionConfig;
use crate::prompt::{ClassificationRequest, OutputSchema};

/// One structured-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub schema: OutputSchema,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn from_classification(request: ClassificationRequest, temperature: f32) -> Self {
        Self {
            system: request.system,
            user: request.user,
            schema: request.schema,
            temperature,
        }
    }
}

/// Failure modes of a completion call. Callers treat them all as one
/// generic failure; the variants exist for logging and retry decisions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Provider refused the request: {0}")]
    Refused(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Output violates schema: {0}")]
    SchemaViolation(String),
}

impl CompletionError {
    /// Transport-level failures are the only ones worth retrying.
    pub fn is_transport(&self) -> bool {
        matches!(self, CompletionError::Network(_) | CompletionError::Timeout(_))
    }
}

/// A structured-completion provider.
///
/// On `Ok` the value satisfies `request.schema`; callers do not re-validate.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionError>;
}

/// Check `instance` against a draft-7 JSON Schema.
pub fn validate_against_schema(schema: &Value, instance: &Value) -> Result<(), CompletionError> {
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
        .map_err(|e| CompletionError::SchemaViolation(format!("invalid output schema: {}", e)))?;

    if let Err(errors) = compiled.validate(instance) {
        let details: Vec<String> = errors
            .map(|err| format!("{} at '{}'", err, err.instance_path))
            .collect();
        return Err(CompletionError::SchemaViolation(details.join("; ")));
    }

    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    strict: bool,
    schema: Value,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

/// OpenAI-compatible chat-completions client with structured outputs.
#[derive(Debug)]
pub struct OpenAiCompletionClient {
    client: Client,
    config: CompletionConfig,
}

impl OpenAiCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::NotConfigured(format!("HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            log::warn!("LLM_API_KEY is not set; every classification will fall back to the default verdict");
        }
        log::info!(
            "Completion client initialized (model: {}, timeout: {:?}, max retries: {})",
            config.model,
            config.timeout,
            config.max_retries
        );

        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Exponential backoff with jitter. The attempt count is bounded by
    /// `max_retries`, not by elapsed time.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_retry_delay)
            .with_max_interval(self.config.max_retry_delay)
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .with_randomization_factor(0.5)
            .build()
    }

    fn build_body(&self, request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            temperature: request.temperature,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.schema.name.clone(),
                    strict: true,
                    schema: request.schema.schema.clone(),
                },
            },
        }
    }

    // Execute a single request attempt
    async fn execute_request(
        &self,
        api_key: &str,
        body: &ChatCompletionRequest,
        schema: &Value,
    ) -> Result<Value, CompletionError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    CompletionError::Timeout(err.to_string())
                } else if err.is_connect() {
                    CompletionError::Network(format!("Connection failed: {}", err))
                } else {
                    CompletionError::Network(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => CompletionError::RateLimited(text),
                code => CompletionError::Provider { status: code, body: text },
            });
        }

        let data: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout(e.to_string())
            } else {
                CompletionError::MalformedResponse(format!("Failed to parse response: {}", e))
            }
        })?;

        if let Some(usage) = &data.usage {
            log::info!("Completion finished. Used {} tokens", usage.total_tokens);
        }

        let message = data
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| {
                CompletionError::MalformedResponse("No choices returned in response".to_string())
            })?;

        if let Some(refusal) = message.refusal {
            return Err(CompletionError::Refused(refusal));
        }

        let content = message.content.ok_or_else(|| {
            CompletionError::MalformedResponse("Completion has no content".to_string())
        })?;

        let value: Value = serde_json::from_str(content.trim()).map_err(|e| {
            CompletionError::MalformedResponse(format!("Content is not JSON: {}", e))
        })?;

        validate_against_schema(schema, &value)?;
        Ok(value)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::NotConfigured("LLM_API_KEY is not set".to_string()))?;

        let body = self.build_body(request);
        let mut backoff = self.create_backoff();
        let mut attempt: u32 = 0;

        log::debug!(
            "Sending structured completion to {} (model: {}, prompt chars: {})",
            self.config.api_url,
            self.config.model,
            request.user.chars().count()
        );

        loop {
            attempt += 1;

            match self.execute_request(api_key, &body, &request.schema.schema).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_transport() || attempt > self.config.max_retries {
                        log::error!("Completion failed after {} attempt(s): {}", attempt, err);
                        return Err(err);
                    }

                    let Some(delay) = backoff.next_backoff() else {
                        log::error!("Exceeded completion retry budget: {}", err);
                        return Err(err);
                    };

                    // Extra jitter on top of the backoff's own randomization.
                    let jitter = rand::thread_rng().gen_range(0..=100);
                    let delay = delay + Duration::from_millis(jitter);
                    log::warn!("Transport error: {}. Retrying in {:?}", err, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::build_classification_request;
    use serde_json::json;

    fn schema() -> Value {
        crate::prompt::output_schema().schema
    }

    #[test]
    fn test_valid_instance_passes() {
        let instance = json!({"priority": "low", "explanation": "Cosmetic colour change."});
        assert!(validate_against_schema(&schema(), &instance).is_ok());
    }

    #[test]
    fn test_out_of_enum_priority_is_rejected() {
        let instance = json!({"priority": "urgent", "explanation": "x"});
        let err = validate_against_schema(&schema(), &instance).unwrap_err();
        assert!(matches!(err, CompletionError::SchemaViolation(_)));
    }

    #[test]
    fn test_overlong_explanation_is_rejected() {
        let instance = json!({"priority": "high", "explanation": "x".repeat(201)});
        assert!(validate_against_schema(&schema(), &instance).is_err());

        // The bound counts characters, not bytes.
        let instance = json!({"priority": "high", "explanation": "é".repeat(200)});
        assert!(validate_against_schema(&schema(), &instance).is_ok());
    }

    #[test]
    fn test_extra_or_missing_fields_are_rejected() {
        let extra = json!({"priority": "low", "explanation": "ok", "confidence": 0.9});
        assert!(validate_against_schema(&schema(), &extra).is_err());

        let missing = json!({"priority": "low"});
        assert!(validate_against_schema(&schema(), &missing).is_err());
    }

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(CompletionError::Network("reset".into()).is_transport());
        assert!(CompletionError::Timeout("30s".into()).is_transport());
        assert!(!CompletionError::SchemaViolation("enum".into()).is_transport());
        assert!(!CompletionError::Provider { status: 503, body: String::new() }.is_transport());
        assert!(!CompletionError::RateLimited(String::new()).is_transport());
    }

    #[test]
    fn test_body_requests_strict_json_schema() {
        let client = OpenAiCompletionClient::new(CompletionConfig::default()).unwrap();
        let request =
            CompletionRequest::from_classification(build_classification_request("a", "b"), 0.3);

        let body = serde_json::to_value(client.build_body(&request)).unwrap();
        assert_eq!(body["model"], json!("gpt-4o-mini"));
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][1]["role"], json!("user"));
        assert_eq!(body["response_format"]["type"], json!("json_schema"));
        assert_eq!(body["response_format"]["json_schema"]["strict"], json!(true));
        assert_eq!(body["response_format"]["json_schema"]["name"], json!("ticket_priority"));
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = OpenAiCompletionClient::new(
            CompletionConfig::default().with_api_url("http://127.0.0.1:9/unreachable"),
        )
        .unwrap();
        assert!(!client.is_configured());

        let request =
            CompletionRequest::from_classification(build_classification_request("a", "b"), 0.3);
        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, CompletionError::NotConfigured(_)));
    }
}
