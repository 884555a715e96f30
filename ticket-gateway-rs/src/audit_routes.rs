//! Audit routes: local audit log merged with the backend's change history.
//!
//! The backend history is best effort. If it cannot be fetched, the local
//! entries are returned on their own.

use std::collections::HashMap;
use std::sync::Arc;

use audit_log::{filter_by_kind, merge_entries};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use shared_types::{AuditEntry, ChangeKind};

use crate::error::ApiError;
use crate::validation::parse_ticket_id;
use crate::TicketGateway;

#[derive(Debug, Serialize)]
pub struct TicketAuditResponse {
    pub success: bool,
    pub ticket_id: u64,
    pub logs: Vec<AuditEntry>,
    pub count: usize,
    pub source: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub success: bool,
    pub logs: Vec<AuditEntry>,
    pub count: usize,
}

impl TicketGateway {
    /// Local entries plus whatever the backend reports, one per id, newest first.
    /// The flag tells whether any backend entries were included.
    async fn merged_audit(&self, ticket_id: Option<u64>) -> (Vec<AuditEntry>, bool) {
        let external = match ticket_id {
            Some(id) => self.backend.ticket_audit(id).await,
            None => self.backend.all_audit().await,
        };
        let external = external.unwrap_or_else(|err| {
            tracing::warn!("Backend audit unavailable, using local entries only: {}", err);
            Vec::new()
        });

        let local = self.audit.query(ticket_id);
        if external.is_empty() {
            return (local, false);
        }

        (merge_entries(external, local), true)
    }

    pub(crate) async fn ticket_audit_handler(
        State(state): State<Arc<Self>>,
        Path(raw_id): Path<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<TicketAuditResponse>, ApiError> {
        let ticket_id = parse_ticket_id(&raw_id)?;
        // Unknown types are ignored rather than rejected.
        let kind = params
            .get("type")
            .and_then(|t| ChangeKind::from_filter(t.trim()));

        let (entries, from_backend) = state.merged_audit(Some(ticket_id)).await;
        let logs = filter_by_kind(entries, kind);

        Ok(Json(TicketAuditResponse {
            success: true,
            ticket_id,
            count: logs.len(),
            logs,
            source: if from_backend { "backend+local" } else { "local" },
        }))
    }

    pub(crate) async fn audit_handler(
        State(state): State<Arc<Self>>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<AuditResponse>, ApiError> {
        let ticket_id = params
            .get("ticketId")
            .map(|raw| parse_ticket_id(raw))
            .transpose()?;

        let (logs, _) = state.merged_audit(ticket_id).await;

        Ok(Json(AuditResponse {
            success: true,
            count: logs.len(),
            logs,
        }))
    }
}
