//! Classification Result Handler.
//!
//! Turns one completion call into a guaranteed verdict. Every failure
//! (provider error, schema mismatch, deadline expiry) degrades to the fixed
//! default of `medium` / "Analysis unavailable", so callers never see an error.

use std::sync::Arc;
use std::time::Duration;

use shared_types::{ClassificationResult, Priority};

use crate::completion::{CompletionError, CompletionProvider, CompletionRequest};
use crate::config::ClassifierConfig;
use crate::prompt::build_classification_request;

/// Explanation attached to every fallback verdict.
pub const FALLBACK_EXPLANATION: &str = "Analysis unavailable";

/// Sampling temperature for classification calls.
pub const CLASSIFICATION_TEMPERATURE: f32 = 0.3;

/// The verdict returned whenever the provider cannot produce one.
pub fn default_verdict() -> ClassificationResult {
    ClassificationResult {
        priority: Priority::Medium,
        explanation: FALLBACK_EXPLANATION.to_string(),
    }
}

/// Result of one classification.
///
/// `Degraded` carries the default verdict plus the reason, so the HTTP layer
/// can answer with the fallback payload and still report the failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Assigned(ClassificationResult),
    Degraded {
        fallback: ClassificationResult,
        reason: String,
    },
}

impl ClassificationOutcome {
    pub fn fallback(reason: impl Into<String>) -> Self {
        ClassificationOutcome::Degraded {
            fallback: default_verdict(),
            reason: reason.into(),
        }
    }

    pub fn result(&self) -> &ClassificationResult {
        match self {
            ClassificationOutcome::Assigned(result) => result,
            ClassificationOutcome::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn into_result(self) -> ClassificationResult {
        match self {
            ClassificationOutcome::Assigned(result) => result,
            ClassificationOutcome::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ClassificationOutcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ClassificationOutcome::Assigned(_) => None,
            ClassificationOutcome::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// Classifies tickets through an injected completion provider.
#[derive(Clone)]
pub struct Classifier {
    provider: Arc<dyn CompletionProvider>,
    deadline: Duration,
}

impl Classifier {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: ClassifierConfig) -> Self {
        Self {
            provider,
            deadline: config.deadline,
        }
    }

    /// Classify one ticket. Never fails.
    pub async fn classify(&self, title: &str, description: &str) -> ClassificationOutcome {
        let request = CompletionRequest::from_classification(
            build_classification_request(title, description),
            CLASSIFICATION_TEMPERATURE,
        );

        let value = match tokio::time::timeout(self.deadline, self.provider.complete(&request)).await
        {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => return degrade(&err),
            Err(_) => {
                let err = CompletionError::Timeout(format!(
                    "classification exceeded {:?} deadline",
                    self.deadline
                ));
                return degrade(&err);
            }
        };

        match serde_json::from_value::<ClassificationResult>(value) {
            Ok(result) => {
                log::debug!("Ticket classified as {}", result.priority);
                ClassificationOutcome::Assigned(result)
            }
            Err(e) => degrade(&CompletionError::MalformedResponse(e.to_string())),
        }
    }
}

fn degrade(err: &CompletionError) -> ClassificationOutcome {
    log::warn!("Classification degraded to default verdict: {}", err);
    ClassificationOutcome::fallback(err.to_string())
}
