//! Ticket and assignee routes.
//!
//! Listing, creation and state transitions are proxied to the ticketing
//! backend. Creation without an explicit priority is triaged by the
//! classifier first; a degraded classification never blocks it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{Assignee, AuditDraft, ClassificationOrigin, Priority, Ticket, TicketStatus};

use crate::backend::NewTicket;
use crate::error::ApiError;
use crate::validation::{
    parse_assignee_limit, parse_count, parse_filter, parse_flag, parse_json_object,
    parse_optional_json_object, parse_target_state, parse_ticket_id, request_params,
    sanitize_json_object, strip_nulls, validate_json_schema, ApiValidationError,
    CREATE_TICKET_SCHEMA, DEFAULT_LIMIT,
};
use crate::TicketGateway;

/// Explanation stored when a caller sets the priority without AI analysis.
pub const MANUAL_EXPLANATION: &str = "Manual classification without AI analysis";

/// Header naming who performed a state transition.
pub const ACTOR_HEADER: &str = "x-actor";

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub success: bool,
    pub tickets: Vec<Ticket>,
    pub count: usize,
    pub total: u64,
}

/// Create ticket request body (JSON)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub ai_priority: Option<Priority>,
    #[serde(default)]
    pub ai_explanation: Option<String>,
    #[serde(default)]
    pub origin: Option<ClassificationOrigin>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub success: bool,
    pub ticket: Ticket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StateChangeSummary {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub previous_state: String,
    pub current_state: String,
}

#[derive(Debug, Serialize)]
pub struct StateChangeResponse {
    pub success: bool,
    pub ticket: StateChangeSummary,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AssigneesResponse {
    pub success: bool,
    pub assignees: Vec<Assignee>,
    pub count: u64,
}

/// Priority fields decided for a new ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct TriageDecision {
    pub priority: Priority,
    pub ai_priority: Priority,
    pub ai_explanation: String,
    pub origin: ClassificationOrigin,
}

impl TicketGateway {
    pub(crate) async fn list_tickets_handler(
        State(state): State<Arc<Self>>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Result<Json<TicketListResponse>, ApiError> {
        let status = parse_filter::<TicketStatus>(params.get("status").map(String::as_str))?;
        let priority = parse_filter::<Priority>(params.get("priority").map(String::as_str))?;
        let limit = parse_count(params.get("limit").map(String::as_str), "limit", DEFAULT_LIMIT)?;
        let offset = parse_count(params.get("offset").map(String::as_str), "offset", 0)?;

        let page = state.backend.list_tickets(limit, offset).await?;

        let tickets: Vec<Ticket> = page
            .records
            .into_iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| priority.map_or(true, |p| t.priority == p))
            .collect();

        tracing::debug!(
            "Listed {} of {} tickets (limit {}, offset {})",
            tickets.len(),
            page.count,
            limit,
            offset
        );

        Ok(Json(TicketListResponse {
            success: true,
            count: tickets.len(),
            total: page.count,
            tickets,
        }))
    }

    pub(crate) async fn create_ticket_handler(
        State(state): State<Arc<Self>>,
        body: Bytes,
    ) -> Result<Json<TicketResponse>, ApiError> {
        let request = parse_create_request(&body)?;
        let decision = state.triage(&request).await;

        let new_ticket = NewTicket {
            title: request.title.clone(),
            description: request.description.clone(),
            priority: decision.priority,
            ai_priority: decision.ai_priority,
            ai_explanation: decision.ai_explanation.clone(),
            origin: decision.origin,
            assignee: request.assignee.clone(),
            tags: request.tags.clone(),
        };

        let created = state.backend.create_ticket(&new_ticket).await?;
        tracing::info!(
            "Created ticket {} with priority {} ({})",
            created.id,
            created.final_priority.unwrap_or(decision.priority),
            decision.origin
        );

        let ticket = Ticket {
            id: Some(created.id),
            title: new_ticket.title,
            description: new_ticket.description,
            priority: created.final_priority.unwrap_or(decision.priority),
            status: TicketStatus::New,
            ai_priority: Some(decision.ai_priority),
            ai_explanation: Some(decision.ai_explanation),
            assignee: created.assignee.or(new_ticket.assignee),
            tags: created.tags.unwrap_or(new_ticket.tags),
            origin: Some(created.origin.unwrap_or(decision.origin)),
        };

        Ok(Json(TicketResponse {
            success: true,
            ticket,
            message: created.message,
        }))
    }

    /// Decide the priority fields for a new ticket.
    ///
    /// An explicit priority is kept as a manual decision; otherwise the
    /// classifier runs, and a degraded result is stored as a rule-based
    /// default.
    pub async fn triage(&self, request: &CreateTicketRequest) -> TriageDecision {
        if let Some(priority) = request.priority {
            return TriageDecision {
                priority,
                ai_priority: request.ai_priority.unwrap_or(priority),
                ai_explanation: request
                    .ai_explanation
                    .clone()
                    .unwrap_or_else(|| MANUAL_EXPLANATION.to_string()),
                origin: request.origin.unwrap_or(ClassificationOrigin::Manual),
            };
        }

        let outcome = self
            .classifier
            .classify(&request.title, &request.description)
            .await;
        let origin = if outcome.is_degraded() {
            ClassificationOrigin::Rule
        } else {
            ClassificationOrigin::Ai
        };
        let result = outcome.into_result();

        TriageDecision {
            priority: result.priority,
            ai_priority: result.priority,
            ai_explanation: result.explanation,
            origin,
        }
    }

    pub(crate) async fn change_state_handler(
        State(state): State<Arc<Self>>,
        Path(raw_id): Path<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Json<StateChangeResponse>, ApiError> {
        let ticket_id = parse_ticket_id(&raw_id)?;
        let next_state = parse_target_state(&parse_json_object(&body)?)?;

        let change = state.backend.change_state(ticket_id, next_state).await?;

        let actor = headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("system")
            .to_string();
        let previous = change
            .previous_state
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let draft =
            AuditDraft::status_change(ticket_id, previous.clone(), next_state.as_str(), Some(actor));
        match state.audit.record(draft) {
            Ok(entry) => tracing::info!(
                "Ticket {} moved {} -> {} (audit {})",
                ticket_id,
                previous,
                next_state,
                entry.id
            ),
            // The backend already applied the transition; report it regardless.
            Err(err) => tracing::error!("Failed to record audit for ticket {}: {}", ticket_id, err),
        }

        Ok(Json(StateChangeResponse {
            success: true,
            ticket: StateChangeSummary {
                id: change.id.unwrap_or(ticket_id),
                title: change.title,
                previous_state: previous,
                current_state: change
                    .current_state
                    .unwrap_or_else(|| next_state.as_str().to_string()),
            },
            message: change
                .message
                .unwrap_or_else(|| "Ticket state updated".to_string()),
        }))
    }

    pub(crate) async fn assignees_handler(
        State(state): State<Arc<Self>>,
        body: Bytes,
    ) -> Result<Json<AssigneesResponse>, ApiError> {
        let body = parse_optional_json_object(&body)?;
        let params = request_params(&body);
        let limit = parse_assignee_limit(params.get("limit"))?;
        let only_active = parse_flag(params.get("only_active"), true);

        let page = state.backend.list_assignees(limit, only_active).await?;
        let count = page.count.unwrap_or(page.records.len() as u64);

        Ok(Json(AssigneesResponse {
            success: true,
            assignees: page.records,
            count,
        }))
    }
}

fn parse_create_request(body: &[u8]) -> Result<CreateTicketRequest, ApiValidationError> {
    let mut map = parse_json_object(body)?;
    strip_nulls(&mut map);
    let mut value = Value::Object(map);

    validate_json_schema(&CREATE_TICKET_SCHEMA, &value)?;
    sanitize_json_object(&mut value);

    let mut request: CreateTicketRequest = serde_json::from_value(value)
        .map_err(|e| ApiValidationError::InvalidFormat(e.to_string()))?;
    request.assignee = request.assignee.filter(|a| !a.trim().is_empty());
    Ok(request)
}
