//! Ticket and classification types.
//!
//! Wire names are lowercase (`high`, `in_progress`, `ai`) on every surface the
//! gateway speaks: its own HTTP API, the ticketing backend, and the completion
//! provider's output schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::wire::{falsy_as_default, falsy_as_none};

/// Hard cap on the length of a classification explanation, in characters.
pub const EXPLANATION_MAX_CHARS: usize = 200;

/// Raised when a wire string is not one of an enum's accepted values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}'; allowed values: {allowed}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub allowed: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str, allowed: &[&str]) -> Self {
        Self {
            kind,
            value: value.to_string(),
            allowed: allowed.join(", "),
        }
    }
}

/// Ticket urgency tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn wire_values() -> Vec<&'static str> {
        Self::ALL.iter().map(Priority::as_str).collect()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("priority", s, &Self::wire_values()))
    }
}

/// Lifecycle state of a ticket. This is the closed set of transition targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    InProgress,
    Resolved,
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::New,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Cancelled => "cancelled",
        }
    }

    pub fn wire_values() -> Vec<&'static str> {
        Self::ALL.iter().map(TicketStatus::as_str).collect()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("status", s, &Self::wire_values()))
    }
}

/// Who decided a ticket's priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationOrigin {
    Ai,
    Rule,
    Manual,
}

impl ClassificationOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationOrigin::Ai => "ai",
            ClassificationOrigin::Rule => "rule",
            ClassificationOrigin::Manual => "manual",
        }
    }
}

impl fmt::Display for ClassificationOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority verdict produced by one classification request.
///
/// The explanation bound is guaranteed by the provider's output schema; this
/// type does not truncate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub priority: Priority,
    pub explanation: String,
}

/// A support ticket as seen through the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Assigned by the ticketing backend.
    #[serde(default)]
    pub id: Option<u64>,
    pub title: String,
    #[serde(default, deserialize_with = "falsy_as_default")]
    pub description: String,
    pub priority: Priority,
    pub status: TicketStatus,
    #[serde(
        default,
        deserialize_with = "falsy_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub ai_priority: Option<Priority>,
    #[serde(
        default,
        deserialize_with = "falsy_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub ai_explanation: Option<String>,
    #[serde(
        default,
        deserialize_with = "falsy_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub assignee: Option<String>,
    /// Ordered, duplicates allowed.
    #[serde(default, deserialize_with = "falsy_as_default")]
    pub tags: Vec<String>,
    #[serde(
        default,
        deserialize_with = "falsy_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub origin: Option<ClassificationOrigin>,
}

/// A user the backend offers as a ticket assignee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignee {
    pub id: u64,
    pub name: String,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub login: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
