use std::sync::Arc;
use std::time::Instant;

use audit_log::AuditStore;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::Priority;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use triage_classifier::{ClassificationOutcome, Classifier};

pub mod audit_routes;
pub mod backend;
pub mod error;
pub mod tickets;
pub mod validation;

#[cfg(test)]
mod tests;

pub use backend::{BackendClient, BackendError, Envelope, Reply};
pub use error::{ApiError, ErrorResponse};

use validation::{
    parse_json_object, sanitize_json_object, validate_json_schema, ApiValidationError,
    ANALYZE_REQUEST_SCHEMA, MAX_PAYLOAD_SIZE,
};

/// Health response body (JSON)
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: u64,
    pub status: String,
    pub llm_configured: bool,
    pub audit_entries: usize,
}

/// Analyze request body (JSON); missing fields read as empty
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Analyze response body (JSON)
///
/// A degraded answer still carries the default priority and explanation,
/// with `success: false` and an `error`.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub priority: Priority,
    pub explanation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Core gateway state shared by every handler
pub struct TicketGateway {
    backend: BackendClient,
    classifier: Classifier,
    audit: Arc<dyn AuditStore>,
    llm_configured: bool,
    started: Instant,
}

impl TicketGateway {
    pub fn new(
        backend: BackendClient,
        classifier: Classifier,
        audit: Arc<dyn AuditStore>,
        llm_configured: bool,
    ) -> Self {
        Self {
            backend,
            classifier,
            audit,
            llm_configured,
            started: Instant::now(),
        }
    }

    /// Create the Axum router with all routes and middleware
    pub fn create_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(Self::root_handler))
            .route("/health", get(Self::health_handler))
            .route("/analyze", post(Self::analyze_handler))
            .route(
                "/tickets",
                get(Self::list_tickets_handler).post(Self::create_ticket_handler),
            )
            .route("/tickets/:id/change_state", post(Self::change_state_handler))
            .route("/tickets/:id/audit", get(Self::ticket_audit_handler))
            .route("/audit", get(Self::audit_handler))
            .route("/assignees", post(Self::assignees_handler))
            .layer(RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .with_state(self)
    }

    async fn root_handler() -> impl IntoResponse {
        Json(serde_json::json!({
            "service": "Support Ticket Triage Gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": [
                "GET /health",
                "POST /analyze",
                "GET /tickets",
                "POST /tickets",
                "POST /tickets/{id}/change_state",
                "GET /tickets/{id}/audit",
                "GET /audit",
                "POST /assignees"
            ]
        }))
    }

    async fn health_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        // Without a provider key every classification degrades to the default.
        let status = if state.llm_configured { "SERVING" } else { "DEGRADED" };

        Json(HealthResponse {
            healthy: true,
            service_name: config_rs::get_formatted_service_name(config_rs::GATEWAY_SERVICE),
            uptime_seconds: state.started.elapsed().as_secs(),
            status: status.to_string(),
            llm_configured: state.llm_configured,
            audit_entries: state.audit.query(None).len(),
        })
    }

    async fn analyze_handler(State(state): State<Arc<Self>>, body: Bytes) -> Response {
        let request = match parse_analyze_request(&body) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("Rejected analysis request: {}", err);
                let outcome = ClassificationOutcome::fallback(err.to_string());
                return analysis_response(StatusCode::BAD_REQUEST, outcome, Some(err.to_string()));
            }
        };

        tracing::info!(
            title_chars = request.title.chars().count(),
            description_chars = request.description.chars().count(),
            "Analyzing ticket priority"
        );

        let outcome = state
            .classifier
            .classify(&request.title, &request.description)
            .await;

        if outcome.is_degraded() {
            let message = "AI analysis unavailable; default priority applied".to_string();
            analysis_response(StatusCode::SERVICE_UNAVAILABLE, outcome, Some(message))
        } else {
            analysis_response(StatusCode::OK, outcome, None)
        }
    }
}

fn parse_analyze_request(body: &[u8]) -> Result<AnalyzeRequest, ApiValidationError> {
    let mut value = Value::Object(parse_json_object(body)?);
    validate_json_schema(&ANALYZE_REQUEST_SCHEMA, &value)?;
    sanitize_json_object(&mut value);
    serde_json::from_value(value).map_err(|e| ApiValidationError::InvalidFormat(e.to_string()))
}

fn analysis_response(
    status: StatusCode,
    outcome: ClassificationOutcome,
    error: Option<String>,
) -> Response {
    let success = !outcome.is_degraded();
    let result = outcome.into_result();
    (
        status,
        Json(AnalyzeResponse {
            success,
            priority: result.priority,
            explanation: result.explanation,
            error,
        }),
    )
        .into_response()
}
