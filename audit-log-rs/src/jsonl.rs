//! Durable audit store backed by an append-only JSON-lines file.
//!
//! Each recorded entry is written as one line and flushed before it becomes
//! visible to `query`. Reopening the file rebuilds the in-memory view and
//! resumes the identifier sequence after the highest id on disk. An
//! unterminated last line is a torn write: it is dropped and cut from the file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use shared_types::{AuditDraft, AuditEntry};

use crate::{parse_seq, snapshot, stamp, AuditError, AuditStore};

struct Inner {
    file: File,
    entries: Vec<AuditEntry>,
    next_seq: u64,
}

pub struct JsonlAuditStore {
    inner: Mutex<Inner>,
}

impl JsonlAuditStore {
    /// Open (or create) the log at `path`, validating every existing line.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let (entries, valid_len) = load_entries(path)?;
        let next_seq = entries
            .iter()
            .filter_map(|e| parse_seq(&e.id))
            .max()
            .unwrap_or(0)
            + 1;

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() > valid_len {
            log::warn!("Dropping torn last line of audit log {}", path.display());
            file.set_len(valid_len)?;
        }

        log::debug!(
            "Reopened audit log {} with {} entries",
            path.display(),
            entries.len()
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                file,
                entries,
                next_seq,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditStore for JsonlAuditStore {
    fn record(&self, draft: AuditDraft) -> Result<AuditEntry, AuditError> {
        let mut inner = self.lock();
        let entry = stamp(draft, inner.next_seq);

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let before = inner.file.metadata()?.len();
        let file = &mut inner.file;
        if let Err(err) = file.write_all(&line).and_then(|_| file.flush()) {
            // Cut any partial line so the log still reloads.
            if let Err(trunc) = file.set_len(before) {
                log::error!("Failed to roll back torn audit line: {}", trunc);
            }
            return Err(err.into());
        }

        // Sequence advances only once the line is on disk.
        inner.next_seq += 1;
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    fn query(&self, ticket_id: Option<u64>) -> Vec<AuditEntry> {
        snapshot(&self.lock().entries, ticket_id)
    }

    fn clear(&self) -> Result<(), AuditError> {
        let mut inner = self.lock();
        inner.file.set_len(0)?;
        inner.entries.clear();
        inner.next_seq = 1;
        Ok(())
    }
}

/// Parse every line, returning the entries and the byte length they span.
fn load_entries(path: &Path) -> Result<(Vec<AuditEntry>, u64), AuditError> {
    if !path.exists() {
        return Ok((Vec::new(), 0));
    }

    let content = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    let mut valid_len: u64 = 0;

    for (idx, segment) in content.split_inclusive('\n').enumerate() {
        if !segment.ends_with('\n') {
            // Never acknowledged to a caller.
            break;
        }
        let line = segment.trim();
        if !line.is_empty() {
            let entry: AuditEntry =
                serde_json::from_str(line).map_err(|e| AuditError::Corrupt {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            entries.push(entry);
        }
        valid_len += segment.len() as u64;
    }

    Ok((entries, valid_len))
}
