//! Process-lifetime audit store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use shared_types::{AuditDraft, AuditEntry};

use crate::{snapshot, stamp, AuditError, AuditStore};

#[derive(Debug)]
struct Inner {
    entries: Vec<AuditEntry>,
    next_seq: u64,
}

/// In-memory, append-only audit store. Grows without bound until `clear`.
#[derive(Debug)]
pub struct InMemoryAuditStore {
    inner: Mutex<Inner>,
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                next_seq: 1,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Entries are pushed whole; a poisoned lock holds no partial state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AuditStore for InMemoryAuditStore {
    fn record(&self, draft: AuditDraft) -> Result<AuditEntry, AuditError> {
        let mut inner = self.lock();
        let entry = stamp(draft, inner.next_seq);
        inner.next_seq += 1;
        inner.entries.push(entry.clone());
        Ok(entry)
    }

    fn query(&self, ticket_id: Option<u64>) -> Vec<AuditEntry> {
        snapshot(&self.lock().entries, ticket_id)
    }

    fn clear(&self) -> Result<(), AuditError> {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.next_seq = 1;
        Ok(())
    }
}
