//! Shared fixtures for router tests.

use std::sync::Arc;
use std::time::Duration;

use audit_log::{AuditStore, InMemoryAuditStore};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use triage_classifier::{Classifier, ClassifierConfig, CompletionProvider};
use wiremock::MockServer;

use crate::{BackendClient, TicketGateway};

pub struct Harness {
    pub backend: MockServer,
    pub audit: Arc<InMemoryAuditStore>,
    pub router: Router,
}

/// Gateway wired to a fresh mock backend, an empty in-memory audit log and
/// the given completion provider.
pub async fn harness(provider: Arc<dyn CompletionProvider>) -> Harness {
    let backend = MockServer::start().await;
    let audit = Arc::new(InMemoryAuditStore::new());

    let client = BackendClient::new(format!("{}/api/support/", backend.uri()), Duration::from_secs(2))
        .expect("backend client");
    let classifier = Classifier::new(
        provider,
        ClassifierConfig {
            deadline: Duration::from_secs(2),
        },
    );
    let store: Arc<dyn AuditStore> = audit.clone();
    let router = Arc::new(TicketGateway::new(client, classifier, store, true)).create_router();

    Harness {
        backend,
        audit,
        router,
    }
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn raw_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

/// Send one request and decode the JSON response body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
