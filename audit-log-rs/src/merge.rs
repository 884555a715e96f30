//! Combining the local audit log with change history from the backend.

use std::collections::HashMap;

use shared_types::{AuditEntry, ChangeKind};

/// Sort in place, most recent first. Stable, so equal timestamps keep their
/// incoming order.
pub fn sort_newest_first(entries: &mut [AuditEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

/// Merge two sources keyed by entry id.
///
/// `external` is applied first and `local` second, so on an id collision the
/// local copy wins. The result holds one entry per id, newest first.
pub fn merge_entries(external: Vec<AuditEntry>, local: Vec<AuditEntry>) -> Vec<AuditEntry> {
    let mut by_id: HashMap<String, AuditEntry> =
        HashMap::with_capacity(external.len() + local.len());

    for entry in external.into_iter().chain(local) {
        by_id.insert(entry.id.clone(), entry);
    }

    let mut merged: Vec<AuditEntry> = by_id.into_values().collect();
    // HashMap order is arbitrary; fix it before the stable timestamp sort.
    merged.sort_by(|a, b| a.id.cmp(&b.id));
    sort_newest_first(&mut merged);
    merged
}

/// Keep only entries of the given kind; `None` keeps everything.
pub fn filter_by_kind(entries: Vec<AuditEntry>, kind: Option<ChangeKind>) -> Vec<AuditEntry> {
    match kind {
        Some(kind) => entries
            .into_iter()
            .filter(|e| e.change_kind == kind)
            .collect(),
        None => entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(id: &str, minutes: i64, kind: ChangeKind, new_value: &str) -> AuditEntry {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        AuditEntry {
            id: id.to_string(),
            ticket_id: 1,
            timestamp: base + Duration::minutes(minutes),
            change_kind: kind,
            field: kind.as_str().to_string(),
            old_value: String::new(),
            new_value: new_value.to_string(),
            actor: None,
        }
    }

    #[test]
    fn test_overlapping_ids_deduplicate_with_local_winning() {
        let external = vec![
            entry("audit_1", 0, ChangeKind::Status, "in_progress"),
            entry("audit_2", 5, ChangeKind::Status, "resolved"),
        ];
        let local = vec![
            entry("audit_2", 6, ChangeKind::Status, "resolved-local"),
            entry("audit_3", 10, ChangeKind::Priority, "high"),
        ];

        let merged = merge_entries(external, local);

        assert_eq!(merged.len(), 3);
        let ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["audit_3", "audit_2", "audit_1"]);
        assert_eq!(merged[1].new_value, "resolved-local");
    }

    #[test]
    fn test_merge_with_empty_external_keeps_local() {
        let local = vec![
            entry("audit_1", 1, ChangeKind::Status, "new"),
            entry("audit_2", 2, ChangeKind::Status, "resolved"),
        ];
        let merged = merge_entries(Vec::new(), local);
        assert_eq!(merged[0].id, "audit_2");
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_filter_by_kind() {
        let entries = vec![
            entry("audit_1", 1, ChangeKind::Status, "resolved"),
            entry("audit_2", 2, ChangeKind::Priority, "low"),
        ];

        let only_priority = filter_by_kind(entries.clone(), Some(ChangeKind::Priority));
        assert_eq!(only_priority.len(), 1);
        assert_eq!(only_priority[0].id, "audit_2");

        assert_eq!(filter_by_kind(entries, None).len(), 2);
    }
}
