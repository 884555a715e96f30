//! Audit trail records for ticket field changes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of field a change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Status,
    Priority,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Status => "status",
            ChangeKind::Priority => "priority",
        }
    }

    /// Lenient parse used for query-string filters; unknown values yield `None`.
    pub fn from_filter(value: &str) -> Option<Self> {
        match value {
            "status" => Some(ChangeKind::Status),
            "priority" => Some(ChangeKind::Priority),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable field-level change to a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub ticket_id: u64,
    pub timestamp: DateTime<Utc>,
    pub change_kind: ChangeKind,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// The caller-supplied part of an audit entry; identifier and timestamp are
/// assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditDraft {
    pub ticket_id: u64,
    pub change_kind: ChangeKind,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub actor: Option<String>,
}

impl AuditDraft {
    /// Draft for a status transition.
    pub fn status_change(
        ticket_id: u64,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
        actor: Option<String>,
    ) -> Self {
        Self {
            ticket_id,
            change_kind: ChangeKind::Status,
            field: ChangeKind::Status.as_str().to_string(),
            old_value: old_value.into(),
            new_value: new_value.into(),
            actor,
        }
    }

    /// Draft for a priority change.
    pub fn priority_change(
        ticket_id: u64,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
        actor: Option<String>,
    ) -> Self {
        Self {
            ticket_id,
            change_kind: ChangeKind::Priority,
            field: ChangeKind::Priority.as_str().to_string(),
            old_value: old_value.into(),
            new_value: new_value.into(),
            actor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_audit_entry_wire_shape_is_camel_case() {
        let entry = AuditEntry {
            id: "audit_1".to_string(),
            ticket_id: 42,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            change_kind: ChangeKind::Status,
            field: "status".to_string(),
            old_value: "new".to_string(),
            new_value: "resolved".to_string(),
            actor: None,
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["ticketId"], json!(42));
        assert_eq!(value["changeKind"], json!("status"));
        assert_eq!(value["oldValue"], json!("new"));
        assert!(value.get("actor").is_none());
    }

    #[test]
    fn test_change_kind_filter_is_lenient() {
        assert_eq!(ChangeKind::from_filter("priority"), Some(ChangeKind::Priority));
        assert_eq!(ChangeKind::from_filter("everything"), None);
    }

    #[test]
    fn test_status_change_draft_names_field() {
        let draft = AuditDraft::status_change(9, "new", "resolved", Some("ops".into()));
        assert_eq!(draft.field, "status");
        assert_eq!(draft.change_kind, ChangeKind::Status);
    }
}
