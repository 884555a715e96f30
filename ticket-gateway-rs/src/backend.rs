// ticket-gateway-rs/src/backend.rs
//
// Ticket Proxy Layer: forwards ticket operations to the external ticketing
// backend and unwraps its reply envelope.
//
// The backend answers either JSON-RPC style (`{jsonrpc, id, result}`) or with
// the bare payload, and reports failures either as `{error}` at the top level
// or inside `result`. Both shapes are modeled by `Envelope` / `Reply`.
//
// No retries happen here: a failed call is reported to the caller once.
//
// Configuration (.env file):
// - TICKET_BACKEND_URL: backend base URL (default: http://localhost:8069/api/support)
// - TICKET_BACKEND_TIMEOUT_SECS: per-request timeout (default: 30)

use std::time::Duration;

use audit_log::AUDIT_ID_PREFIX;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{
    falsy_as_none, Assignee, AuditEntry, ChangeKind, ClassificationOrigin, Priority, Ticket,
    TicketStatus,
};

/// Failure talking to the ticketing backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("backend error: {0}")]
    Fault(String),

    #[error("unexpected backend response: {0}")]
    Decode(String),
}

/// Error detail reported by the backend, either structured or a bare string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BackendFault {
    Detail {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        data: Option<Value>,
    },
    Message(String),
}

impl BackendFault {
    pub fn message(&self) -> String {
        match self {
            BackendFault::Message(message) => message.clone(),
            BackendFault::Detail {
                message: Some(message),
                ..
            } => message.clone(),
            BackendFault::Detail { code: Some(code), .. } => format!("error code {}", code),
            BackendFault::Detail { .. } => "unspecified backend error".to_string(),
        }
    }
}

/// Payload or error, as found at either level of the envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Fault { error: BackendFault },
    Ok(T),
}

/// The two reply shapes the backend uses.
///
/// The shape is chosen by the presence of a top-level `result` member, never
/// by trial decoding: a `result` that does not decode is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Wrapped { result: Reply<T> },
    Bare(Reply<T>),
}

impl<T: DeserializeOwned> Envelope<T> {
    pub fn from_value(mut value: Value) -> Result<Self, BackendError> {
        if let Some(result) = value.as_object_mut().and_then(|map| map.remove("result")) {
            let result = serde_json::from_value(result)
                .map_err(|e| BackendError::Decode(format!("result: {}", e)))?;
            return Ok(Envelope::Wrapped { result });
        }

        let reply =
            serde_json::from_value(value).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Envelope::Bare(reply))
    }
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<T, BackendError> {
        let reply = match self {
            Envelope::Wrapped { result } => result,
            Envelope::Bare(reply) => reply,
        };
        match reply {
            Reply::Ok(payload) => Ok(payload),
            Reply::Fault { error } => Err(BackendError::Fault(error.message())),
        }
    }
}

#[derive(Debug, Serialize)]
struct ListTicketsRequest {
    limit: u32,
    offset: u32,
}

/// One page of tickets as the backend reports it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub records: Vec<Ticket>,
}

/// Ticket creation request forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub ai_priority: Priority,
    pub ai_explanation: String,
    pub origin: ClassificationOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Backend acknowledgement of a created ticket.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedTicket {
    pub id: u64,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub final_priority: Option<Priority>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub ai_priority: Option<Priority>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub ai_explanation: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub origin: Option<ClassificationOrigin>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub assignee: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ChangeStateRequest {
    state: TicketStatus,
}

/// Backend acknowledgement of a state transition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateChange {
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub id: Option<u64>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub previous_state: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub current_state: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuditPayload {
    #[serde(default)]
    audit: Option<Vec<ExternalAuditRecord>>,
    #[serde(default)]
    logs: Option<Vec<ExternalAuditRecord>>,
}

/// Audit record as the backend stores it. Field names vary between backend
/// versions, hence the aliases.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuditRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub ticket_id: Option<u64>,
    #[serde(default, alias = "fieldChanged")]
    pub field_name: Option<String>,
    #[serde(default)]
    pub old_value: Option<Value>,
    #[serde(default)]
    pub new_value: Option<Value>,
    #[serde(default, alias = "changedBy")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub change_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssigneesRequest {
    limit: u32,
    only_active: bool,
}

/// Assignees offered by the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssigneePage {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub records: Vec<Assignee>,
}

/// HTTP client for the ticketing backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> Result<Self, BackendError> {
        let timeout = std::env::var("TICKET_BACKEND_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);
        Self::new(config_rs::get_backend_base_url(), Duration::from_secs(timeout))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!("POST {}", self.url(path));
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_envelope(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        tracing::debug!("GET {}", self.url(path));
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport_error)?;
        read_envelope(response).await
    }

    pub async fn list_tickets(&self, limit: u32, offset: u32) -> Result<TicketPage, BackendError> {
        self.post("/tickets", &ListTicketsRequest { limit, offset }).await
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<CreatedTicket, BackendError> {
        self.post("/ticket", ticket).await
    }

    pub async fn change_state(
        &self,
        ticket_id: u64,
        state: TicketStatus,
    ) -> Result<StateChange, BackendError> {
        self.post(
            &format!("/ticket/{}/change_state", ticket_id),
            &ChangeStateRequest { state },
        )
        .await
    }

    /// Change history of one ticket, normalized to local audit entries.
    pub async fn ticket_audit(&self, ticket_id: u64) -> Result<Vec<AuditEntry>, BackendError> {
        let payload: AuditPayload = self.get(&format!("/ticket/{}/audit", ticket_id)).await?;
        Ok(normalize_payload(payload, Some(ticket_id)))
    }

    /// Change history of every ticket, normalized to local audit entries.
    pub async fn all_audit(&self) -> Result<Vec<AuditEntry>, BackendError> {
        let payload: AuditPayload = self.get("/audit").await?;
        Ok(normalize_payload(payload, None))
    }

    pub async fn list_assignees(
        &self,
        limit: u32,
        only_active: bool,
    ) -> Result<AssigneePage, BackendError> {
        self.post("/assignees", &AssigneesRequest { limit, only_active })
            .await
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Transport(format!("request timed out: {}", err))
    } else {
        BackendError::Transport(err.to_string())
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        tracing::warn!("Backend returned {}", status);
        return Err(BackendError::Status {
            status: status.as_u16(),
            message: upstream_message(&text),
        });
    }

    let value: Value = serde_json::from_str(&text)
        .map_err(|e| BackendError::Decode(format!("{} ({} bytes)", e, text.len())))?;
    Envelope::<T>::from_value(value)?.into_result()
}

/// Best-effort extraction of the human-readable message from an error body.
fn upstream_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let candidates = [
                value.pointer("/error/message"),
                value.pointer("/error"),
                value.pointer("/result/error/message"),
                value.pointer("/message"),
            ];
            candidates
                .into_iter()
                .flatten()
                .find_map(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| body.to_string())
        }
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn normalize_payload(payload: AuditPayload, ticket_id: Option<u64>) -> Vec<AuditEntry> {
    let records = payload.audit.or(payload.logs).unwrap_or_default();
    let total = records.len();
    let entries: Vec<AuditEntry> = records
        .into_iter()
        .filter_map(|record| normalize_record(record, ticket_id))
        .collect();

    if entries.len() < total {
        tracing::debug!(
            "Skipped {} backend audit records without id or ticket",
            total - entries.len()
        );
    }
    entries
}

/// Map one backend audit record onto the local entry shape.
///
/// Records without an id, or without a ticket when none is implied by the
/// request, cannot be merged and are dropped.
pub fn normalize_record(
    record: ExternalAuditRecord,
    fallback_ticket: Option<u64>,
) -> Option<AuditEntry> {
    let id = match record.id? {
        Value::String(s) if !s.is_empty() => s,
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let ticket_id = record.ticket_id.or(fallback_ticket)?;

    let field = record.field_name.unwrap_or_else(|| "status".to_string());
    let change_kind = match record.change_type.as_deref() {
        Some("priority") => ChangeKind::Priority,
        Some("create") | Some("state_change") | Some("status") => ChangeKind::Status,
        _ if field == "priority" => ChangeKind::Priority,
        _ => ChangeKind::Status,
    };

    let timestamp = record
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    Some(AuditEntry {
        id: format!("{}{}", AUDIT_ID_PREFIX, id),
        ticket_id,
        timestamp,
        change_kind,
        field,
        old_value: render_value(record.old_value),
        new_value: render_value(record.new_value),
        actor: Some(record.user_name.unwrap_or_else(|| "system".to_string())),
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Backend datetimes without an offset are UTC.
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// Empty/false values come back as JSON false from some backends.
fn render_value(value: Option<Value>) -> String {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}
