//! In-process completion providers for tests.
//!
//! Compiled for this crate's tests and, behind the `test-support` feature,
//! for downstream crates that need a classifier without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::completion::{CompletionError, CompletionProvider, CompletionRequest};

/// Returns a fixed response and records every request it sees.
pub struct ScriptedProvider {
    response: Result<Value, CompletionError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn returning(value: Value) -> Self {
        Self::new(Ok(value))
    }

    pub fn failing(err: CompletionError) -> Self {
        Self::new(Err(err))
    }

    fn new(response: Result<Value, CompletionError>) -> Self {
        Self {
            response,
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }
}

const HIGH_EVIDENCE: &[&str] = &[
    "all users",
    "nobody can",
    "corruption",
    "data loss",
    "outage",
    "security",
];

const MEDIUM_EVIDENCE: &[&str] = &["some users", "intermittent", "slow", "error", "workaround"];

const URGENCY_WORDS: &[&str] = &["urgent", "critical", "asap", "!!!"];

/// Deterministic stand-in for a model.
///
/// When the system prompt carries the evidence-first policy it grades on
/// impact keywords alone; without it, it is swayed by urgency wording the way
/// an unguided model would be.
pub struct PolicyFollowingProvider;

impl PolicyFollowingProvider {
    fn policy_applies(system: &str) -> bool {
        system.contains("Start from low") && system.contains("Disregard emotional language")
    }
}

#[async_trait]
impl CompletionProvider for PolicyFollowingProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Value, CompletionError> {
        // Only the ticket itself, not the instruction preamble.
        let ticket = request
            .user
            .split_once("Title:")
            .map(|(_, rest)| rest)
            .unwrap_or(&request.user)
            .to_lowercase();

        let hit = |words: &[&'static str]| first_hit(&ticket, words);

        let (priority, explanation) = if Self::policy_applies(&request.system) {
            if let Some(word) = hit(HIGH_EVIDENCE) {
                ("high", format!("Objective impact reported: {}.", word))
            } else if let Some(word) = hit(MEDIUM_EVIDENCE) {
                ("medium", format!("Limited impact reported: {}.", word))
            } else {
                ("low", "No measurable impact beyond a request or cosmetic change.".to_string())
            }
        } else if let Some(word) = hit(URGENCY_WORDS) {
            ("high", format!("Requester marked this as {}.", word))
        } else {
            ("medium", "Unclear impact.".to_string())
        };

        let value = json!({ "priority": priority, "explanation": explanation });
        crate::completion::validate_against_schema(&request.schema.schema, &value)?;
        Ok(value)
    }
}

fn first_hit(text: &str, words: &[&'static str]) -> Option<&'static str> {
    words.iter().copied().find(|w| text.contains(w))
}
