//! Ticket Gateway Input Validation
//!
//! Parses and checks client input before anything is forwarded to the
//! ticketing backend or the completion provider. Every failure here maps to a
//! 400 response and no external call.

use std::str::FromStr;

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};
use shared_types::{Priority, TicketStatus};

/// Maximum request payload size (1MB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Default page size for ticket listings and assignee lookups
pub const DEFAULT_LIMIT: u32 = 100;

/// Upper bound for assignee lookups
pub const MAX_ASSIGNEE_LIMIT: u32 = 500;

lazy_static::lazy_static! {
    /// Schema for ticket creation
    pub static ref CREATE_TICKET_SCHEMA: JSONSchema = {
        let schema = json!({
            "type": "object",
            "required": ["title", "description"],
            "properties": {
                "title": {"type": "string", "minLength": 1},
                "description": {"type": "string"},
                "priority": {"type": "string", "enum": Priority::wire_values()},
                "ai_priority": {"type": "string", "enum": Priority::wire_values()},
                "ai_explanation": {"type": "string", "maxLength": shared_types::EXPLANATION_MAX_CHARS},
                "origin": {"type": "string", "enum": ["ai", "rule", "manual"]},
                "assignee": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        });

        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .expect("Invalid create-ticket schema")
    };

    /// Schema for standalone analysis; both fields may be absent or empty
    pub static ref ANALYZE_REQUEST_SCHEMA: JSONSchema = {
        let schema = json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "description": {"type": "string"}
            }
        });

        JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema)
            .expect("Invalid analyze schema")
    };
}

/// Validation error for client requests
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Schema validation error: {0}")]
    Schema(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Parse a request body that must be a JSON object.
pub fn parse_json_object(body: &[u8]) -> Result<Map<String, Value>, ApiValidationError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| ApiValidationError::InvalidFormat("Request body is not valid UTF-8".to_string()))?;

    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiValidationError::InvalidFormat(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(ApiValidationError::InvalidFormat(format!("Invalid JSON: {}", e))),
    }
}

/// Like `parse_json_object`, but an empty body is an empty object.
pub fn parse_optional_json_object(body: &[u8]) -> Result<Map<String, Value>, ApiValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    parse_json_object(body)
}

/// Validate a JSON payload against one of the request schemas.
pub fn validate_json_schema(schema: &JSONSchema, value: &Value) -> Result<(), ApiValidationError> {
    if let Err(errors) = schema.validate(value) {
        let details: Vec<String> = errors
            .map(|err| {
                let path = err.instance_path.to_string();
                if path.is_empty() {
                    err.to_string()
                } else {
                    format!("{} at {}", err, path)
                }
            })
            .collect();

        return Err(ApiValidationError::Schema(if details.is_empty() {
            "Schema validation failed".to_string()
        } else {
            details.join("; ")
        }));
    }
    Ok(())
}

/// Drop `null` members so they read as absent.
pub fn strip_nulls(map: &mut Map<String, Value>) {
    map.retain(|_, v| !v.is_null());
}

/// Remove NUL bytes from every string, recursively.
pub fn sanitize_json_object(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.contains('\u{0000}') {
                *s = s.replace('\u{0000}', "");
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize_json_object),
        Value::Object(obj) => obj.values_mut().for_each(sanitize_json_object),
        _ => {}
    }
}

/// Ticket identifiers in paths and query strings are unsigned integers.
pub fn parse_ticket_id(raw: &str) -> Result<u64, ApiValidationError> {
    raw.trim().parse::<u64>().map_err(|_| {
        ApiValidationError::InvalidValue(format!("ticket id must be numeric, got '{}'", raw))
    })
}

/// Optional enum filter from a query string; absent or `all` means no filter.
pub fn parse_filter<T>(raw: Option<&str>) -> Result<Option<T>, ApiValidationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| ApiValidationError::InvalidValue(e.to_string())),
    }
}

/// Optional non-negative integer from a query string.
pub fn parse_count(raw: Option<&str>, name: &str, default: u32) -> Result<u32, ApiValidationError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value.parse::<u32>().map_err(|_| {
            ApiValidationError::InvalidValue(format!("{} must be numeric, got '{}'", name, value))
        }),
    }
}

/// Assignee limit: a number or a numeric string, clamped to
/// `MAX_ASSIGNEE_LIMIT`; anything below 1 becomes `DEFAULT_LIMIT`.
pub fn parse_assignee_limit(raw: Option<&Value>) -> Result<u32, ApiValidationError> {
    let not_numeric = || ApiValidationError::InvalidValue("limit must be numeric".to_string());

    let limit: i64 = match raw {
        None | Some(Value::Null) => return Ok(DEFAULT_LIMIT),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            None => n.as_f64().filter(|f| f.is_finite()).ok_or_else(not_numeric)?.trunc() as i64,
        },
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return Err(not_numeric());
            }
            // All digits; overflow can only mean "very large".
            trimmed.parse::<i64>().unwrap_or(i64::MAX)
        }
        Some(_) => return Err(not_numeric()),
    };

    Ok(if limit < 1 {
        DEFAULT_LIMIT
    } else if limit > i64::from(MAX_ASSIGNEE_LIMIT) {
        MAX_ASSIGNEE_LIMIT
    } else {
        limit as u32
    })
}

/// A boolean or the strings "true"/"false"; anything else yields `default`.
pub fn parse_flag(raw: Option<&Value>, default: bool) -> bool {
    match raw {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        _ => default,
    }
}

/// Arguments may arrive bare or JSON-RPC style under `params`.
pub fn request_params(body: &Map<String, Value>) -> &Map<String, Value> {
    match body.get("params") {
        Some(Value::Object(params)) => params,
        _ => body,
    }
}

/// Target state of a transition, from `state` or `params.state`.
pub fn parse_target_state(body: &Map<String, Value>) -> Result<TicketStatus, ApiValidationError> {
    let raw = body
        .get("state")
        .or_else(|| match body.get("params") {
            Some(Value::Object(params)) => params.get("state"),
            _ => None,
        })
        .and_then(Value::as_str)
        .ok_or_else(|| ApiValidationError::MissingField("state".to_string()))?;

    raw.parse::<TicketStatus>()
        .map_err(|e| ApiValidationError::InvalidValue(e.to_string()))
}
