// triage-classifier-rs/src/lib.rs
// AI-assisted priority classification for support tickets.
//
// Three parts, each replaceable on its own:
//
// - prompt: builds the policy-carrying instructions and the strict output schema
// - completion: calls a structured-output LLM endpoint (`CompletionProvider`)
// - handler: maps any failure to the fixed medium / "Analysis unavailable" verdict
//
// The `Classifier` is the only entry point the gateway uses.

pub mod completion;
pub mod config;
pub mod handler;
pub mod prompt;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use completion::{
    validate_against_schema, CompletionError, CompletionProvider, CompletionRequest,
    OpenAiCompletionClient,
};
pub use config::{ClassifierConfig, CompletionConfig};
pub use handler::{
    default_verdict, ClassificationOutcome, Classifier, CLASSIFICATION_TEMPERATURE,
    FALLBACK_EXPLANATION,
};
pub use prompt::{build_classification_request, output_schema, ClassificationRequest, OutputSchema};
