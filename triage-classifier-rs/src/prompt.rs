//! Classification Request Builder.
//!
//! Builds the system and user instructions for one classification and
//! declares the strict output schema the provider must satisfy. Pure: no
//! validation, no side effects. Empty titles and descriptions are legal and
//! simply give the model less to work with.

use serde_json::{json, Value};
use shared_types::{Priority, EXPLANATION_MAX_CHARS};

/// Name under which the output schema is registered with the provider.
pub const SCHEMA_NAME: &str = "ticket_priority";

/// System-role instructions carrying the classification policy.
///
/// Biased toward the lowest tier; urgency wording is not evidence.
pub const SYSTEM_PROMPT: &str = "\
You are a support-ticket triage assistant. Classify the priority of each ticket as \
high, medium or low and justify the verdict in at most 200 characters. Always answer \
with JSON that matches the provided schema.

Classification policy:
- Start from low. Raise the priority only when the ticket gives strong, objective evidence.
- Disregard emotional language and urgency claims made by the requester, such as \
\"urgent\", \"critical\", \"ASAP\", capital letters or exclamation marks. They are not evidence.
- Base the verdict only on: measurable technical impact, the number of affected users, \
whether a workaround exists, and risk to data or security.
- high: a core service is down or unusable for many or all users with no workaround, \
or data or security is at risk.
- medium: a real defect that affects some users or degrades a feature, with a workaround \
or limited scope.
- low: cosmetic changes, content or feature requests, questions, or single-user issues \
with a workaround.
- The explanation names the objective evidence behind the verdict, never the requester's tone.";

/// Output contract declared to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

/// Everything needed to ask for one classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRequest {
    pub system: String,
    pub user: String,
    pub schema: OutputSchema,
}

/// JSON Schema for `{priority, explanation}`.
pub fn output_schema() -> OutputSchema {
    OutputSchema {
        name: SCHEMA_NAME.to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "priority": {
                    "type": "string",
                    "enum": Priority::wire_values(),
                    "description": "Priority tier of the support ticket"
                },
                "explanation": {
                    "type": "string",
                    "maxLength": EXPLANATION_MAX_CHARS,
                    "description": "One or two sentences naming the evidence behind the priority"
                }
            },
            "required": ["priority", "explanation"],
            "additionalProperties": false
        }),
    }
}

/// Title and description are embedded verbatim.
pub fn user_prompt(title: &str, description: &str) -> String {
    format!(
        "Classify the priority of the following support ticket.\n\nTitle: {}\nDescription: {}",
        title, description
    )
}

pub fn build_classification_request(title: &str, description: &str) -> ClassificationRequest {
    ClassificationRequest {
        system: SYSTEM_PROMPT.to_string(),
        user: user_prompt(title, description),
        schema: output_schema(),
    }
}
