// audit-log-rs/src/lib.rs
// Append-only audit log for ticket status and priority changes.
//
// The store is an injected dependency with an explicit lifecycle:
//
// - created once at process start (`open_store`)
// - append-only: entries are never mutated once recorded
// - reset only through `AuditStore::clear`, intended for test isolation
// - optionally durable: `JsonlAuditStore` appends one JSON document per line
//
// Configuration (.env file):
// - AUDIT_LOG_PATH: when set, entries are persisted to this JSON-lines file

use std::path::PathBuf;
use std::sync::Arc;

use shared_types::{AuditDraft, AuditEntry};

pub mod jsonl;
pub mod memory;
pub mod merge;

pub use jsonl::JsonlAuditStore;
pub use memory::InMemoryAuditStore;
pub use merge::{filter_by_kind, merge_entries, sort_newest_first};

/// Prefix shared by every generated audit identifier.
pub const AUDIT_ID_PREFIX: &str = "audit_";

/// Storage seam for the audit log.
///
/// Implementations must assign identifiers atomically so concurrent
/// `record` calls never collide.
pub trait AuditStore: Send + Sync {
    /// Append a new entry with a generated sequential id and the current time.
    fn record(&self, draft: AuditDraft) -> Result<AuditEntry, AuditError>;

    /// All entries, optionally for one ticket, newest first.
    ///
    /// The returned vector is an owned copy; mutating it never affects the log.
    fn query(&self, ticket_id: Option<u64>) -> Vec<AuditEntry>;

    /// Drop every entry and restart the sequence at 1.
    fn clear(&self) -> Result<(), AuditError>;
}

/// Errors produced by audit stores.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("audit log corrupted at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

/// Audit log configuration derived from environment.
#[derive(Debug, Clone, Default)]
pub struct AuditLogConfig {
    /// Durable JSON-lines file; `None` keeps the log in memory only.
    pub path: Option<PathBuf>,
}

impl AuditLogConfig {
    pub fn from_env() -> Self {
        let path = std::env::var("AUDIT_LOG_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self { path }
    }
}

/// Build the store selected by `config`.
pub fn open_store(config: &AuditLogConfig) -> Result<Arc<dyn AuditStore>, AuditError> {
    match &config.path {
        Some(path) => {
            log::info!("Audit log persisted to {}", path.display());
            Ok(Arc::new(JsonlAuditStore::open(path)?))
        }
        None => {
            log::info!("Audit log kept in memory for the lifetime of the process");
            Ok(Arc::new(InMemoryAuditStore::new()))
        }
    }
}

// --- helpers ---------------------------------------------------------------

pub(crate) fn format_id(seq: u64) -> String {
    format!("{AUDIT_ID_PREFIX}{seq}")
}

pub(crate) fn parse_seq(id: &str) -> Option<u64> {
    id.strip_prefix(AUDIT_ID_PREFIX)?.parse().ok()
}

/// Materialize a draft into an entry stamped now.
pub(crate) fn stamp(draft: AuditDraft, seq: u64) -> AuditEntry {
    AuditEntry {
        id: format_id(seq),
        ticket_id: draft.ticket_id,
        timestamp: chrono::Utc::now(),
        change_kind: draft.change_kind,
        field: draft.field,
        old_value: draft.old_value,
        new_value: draft.new_value,
        actor: draft.actor,
    }
}

/// Copy out the entries for `ticket_id` (or all), newest first.
///
/// Entries recorded later win timestamp ties.
pub(crate) fn snapshot(entries: &[AuditEntry], ticket_id: Option<u64>) -> Vec<AuditEntry> {
    let mut out: Vec<AuditEntry> = entries
        .iter()
        .rev()
        .filter(|e| ticket_id.map_or(true, |id| e.ticket_id == id))
        .cloned()
        .collect();
    sort_newest_first(&mut out);
    out
}
