// triage-classifier-rs/src/config.rs
//
// Configuration (.env file):
// - LLM_API_KEY: API key for the completion provider (read once, never logged)
// - LLM_API_URL: chat completions endpoint (defaults to OpenAI)
// - LLM_MODEL: model with structured-output support (default: "gpt-4o-mini")
// - LLM_TIMEOUT_SECS: per-request HTTP timeout (default: 30)
// - LLM_MAX_RETRIES: retries on transport failures only (default: 1, 0 disables)
// - LLM_INITIAL_RETRY_DELAY_MS: first backoff delay in ms (default: 250)
// - LLM_MAX_RETRY_DELAY_MS: backoff ceiling in ms (default: 2000)
// - CLASSIFICATION_DEADLINE_SECS: overall budget for one classification (default: 45)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Connection and retry settings for the completion provider.
#[derive(Clone)]
pub struct CompletionConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 1,
            initial_retry_delay: Duration::from_millis(250),
            max_retry_delay: Duration::from_millis(2000),
        }
    }
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = env::var("LLM_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Self {
            api_url: env::var("LLM_API_URL").unwrap_or(defaults.api_url),
            api_key,
            model: env::var("LLM_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(get_env_var("LLM_TIMEOUT_SECS", 30)),
            max_retries: get_env_var("LLM_MAX_RETRIES", defaults.max_retries),
            initial_retry_delay: Duration::from_millis(get_env_var(
                "LLM_INITIAL_RETRY_DELAY_MS",
                250,
            )),
            max_retry_delay: Duration::from_millis(get_env_var("LLM_MAX_RETRY_DELAY_MS", 2000)),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

// The key must never reach a log line, so Debug is written by hand.
impl fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("initial_retry_delay", &self.initial_retry_delay)
            .field("max_retry_delay", &self.max_retry_delay)
            .finish()
    }
}

/// Settings for the result handler.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Upper bound on one classification including retries.
    pub deadline: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(45),
        }
    }
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        Self {
            deadline: Duration::from_secs(get_env_var("CLASSIFICATION_DEADLINE_SECS", 45)),
        }
    }
}

// Helper function to read environment variables with default values
fn get_env_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompletionConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = CompletionConfig::default().with_api_key("sk-very-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_environment_variables() {
        env::set_var("LLM_MODEL", "gpt-4o");
        env::set_var("LLM_MAX_RETRIES", "0");
        env::set_var("LLM_TIMEOUT_SECS", "not-a-number");
        env::set_var("LLM_API_KEY", "   ");

        let config = CompletionConfig::from_env();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.api_key.is_none());

        env::remove_var("LLM_MODEL");
        env::remove_var("LLM_MAX_RETRIES");
        env::remove_var("LLM_TIMEOUT_SECS");
        env::remove_var("LLM_API_KEY");
    }
}
