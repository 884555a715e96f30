// ticket-gateway-rs/src/main.rs
// Support Ticket Triage Gateway - HTTP entry point
// Port 8282 by default (TICKET_GATEWAY_SERVICE_PORT / TICKET_GATEWAY_SERVICE_ADDR)
//
// Wires together:
// - the ticketing backend proxy (TICKET_BACKEND_URL)
// - the priority classifier (LLM_* settings, CLASSIFICATION_DEADLINE_SECS)
// - the audit log (in memory, or AUDIT_LOG_PATH for a JSON-lines file)

use std::sync::Arc;

use audit_log::{open_store, AuditLogConfig};
use config_rs::{get_bind_address, get_default_port, GATEWAY_SERVICE};
use ticket_gateway::{BackendClient, TicketGateway};
use tracing_subscriber::EnvFilter;
use triage_classifier::{
    Classifier, ClassifierConfig, CompletionConfig, OpenAiCompletionClient,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before the filter reads RUST_LOG
    config_rs::load_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let backend = BackendClient::from_env()?;
    tracing::info!("Ticketing backend: {}", backend.base_url());

    let completion = OpenAiCompletionClient::new(CompletionConfig::from_env())?;
    let llm_configured = completion.is_configured();
    let classifier = Classifier::new(Arc::new(completion), ClassifierConfig::from_env());

    let audit = open_store(&AuditLogConfig::from_env())?;

    let gateway = Arc::new(TicketGateway::new(backend, classifier, audit, llm_configured));
    let app = gateway.create_router();

    let addr = get_bind_address(GATEWAY_SERVICE, get_default_port(GATEWAY_SERVICE));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Ticket gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Ticket gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
