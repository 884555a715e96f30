//! Audit routes: merging local entries with backend history

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use audit_log::AuditStore;
    use axum::http::StatusCode;
    use serde_json::json;
    use shared_types::AuditDraft;
    use triage_classifier::testing::ScriptedProvider;
    use triage_classifier::CompletionError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use crate::tests::support::{get, harness, Harness};

    async fn setup() -> Harness {
        harness(Arc::new(ScriptedProvider::failing(CompletionError::NotConfigured(
            "unused".into(),
        ))))
        .await
    }

    #[tokio::test]
    async fn test_ticket_audit_merges_and_deduplicates() {
        let h = setup().await;
        // Local entry audit_1, recorded now.
        h.audit
            .record(AuditDraft::status_change(7, "new", "in_progress", Some("dana".into())))
            .unwrap();

        Mock::given(method("GET"))
            .and(path("/api/support/ticket/7/audit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "result": {
                    "audit": [
                        {
                            "id": 1,
                            "fieldName": "status",
                            "oldValue": "new",
                            "newValue": "cancelled",
                            "userName": "backend-admin",
                            "timestamp": "2026-01-05 08:00:00",
                            "changeType": "state_change"
                        },
                        {
                            "id": 2,
                            "fieldName": "priority",
                            "oldValue": "low",
                            "newValue": "high",
                            "timestamp": "2026-01-04 08:00:00",
                            "changeType": "priority"
                        }
                    ]
                }
            })))
            .expect(1)
            .mount(&h.backend)
            .await;

        let (status, body) = send_get(&h, "/tickets/7/audit").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["ticket_id"], json!(7));
        assert_eq!(body["source"], json!("backend+local"));
        assert_eq!(body["count"], json!(2));

        let logs = body["logs"].as_array().unwrap();
        // The local copy of audit_1 wins and is the newest.
        assert_eq!(logs[0]["id"], json!("audit_1"));
        assert_eq!(logs[0]["newValue"], json!("in_progress"));
        assert_eq!(logs[0]["actor"], json!("dana"));
        assert_eq!(logs[1]["id"], json!("audit_2"));
        assert_eq!(logs[1]["changeKind"], json!("priority"));
    }

    #[tokio::test]
    async fn test_ticket_audit_filters_by_type() {
        let h = setup().await;
        h.audit
            .record(AuditDraft::status_change(7, "new", "resolved", None))
            .unwrap();

        Mock::given(method("GET"))
            .and(path("/api/support/ticket/7/audit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "logs": [{
                    "id": 50,
                    "fieldChanged": "priority",
                    "oldValue": "medium",
                    "newValue": "low",
                    "changedBy": "lee",
                    "timestamp": "2026-01-04T08:00:00Z"
                }]
            })))
            .mount(&h.backend)
            .await;

        let (status, body) = send_get(&h, "/tickets/7/audit?type=priority").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(1));
        assert_eq!(body["logs"][0]["id"], json!("audit_50"));
        assert_eq!(body["logs"][0]["actor"], json!("lee"));
    }

    #[tokio::test]
    async fn test_ticket_audit_falls_back_to_local_when_backend_fails() {
        let h = setup().await;
        h.audit
            .record(AuditDraft::status_change(3, "new", "resolved", None))
            .unwrap();
        h.audit
            .record(AuditDraft::status_change(4, "new", "cancelled", None))
            .unwrap();

        Mock::given(method("GET"))
            .and(path("/api/support/ticket/3/audit"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&h.backend)
            .await;

        let (status, body) = send_get(&h, "/tickets/3/audit").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], json!("local"));
        assert_eq!(body["count"], json!(1));
        assert_eq!(body["logs"][0]["ticketId"], json!(3));
    }

    #[tokio::test]
    async fn test_ticket_audit_rejects_non_numeric_id() {
        let h = setup().await;
        let (status, body) = send_get(&h, "/tickets/seven/audit").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_all_audit_merges_every_ticket() {
        let h = setup().await;
        h.audit
            .record(AuditDraft::status_change(1, "new", "in_progress", None))
            .unwrap();
        h.audit
            .record(AuditDraft::priority_change(2, "low", "medium", None))
            .unwrap();

        Mock::given(method("GET"))
            .and(path("/api/support/audit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "audit": [
                    {"id": 900, "ticketId": 5, "changeType": "create", "newValue": "new",
                     "timestamp": "2026-01-01 00:00:00"},
                    // No ticket: cannot be attributed, dropped.
                    {"id": 901, "changeType": "create", "newValue": "new"}
                ]
            })))
            .expect(1)
            .mount(&h.backend)
            .await;

        let (status, body) = send_get(&h, "/audit").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(3));
        let logs = body["logs"].as_array().unwrap();
        let mut recent: Vec<&str> = logs[..2].iter().map(|l| l["id"].as_str().unwrap()).collect();
        recent.sort();
        assert_eq!(recent, vec!["audit_1", "audit_2"]);
        assert_eq!(logs[2]["id"], json!("audit_900"));
    }

    #[tokio::test]
    async fn test_audit_by_ticket_query() {
        let h = setup().await;
        h.audit
            .record(AuditDraft::status_change(6, "new", "resolved", None))
            .unwrap();

        Mock::given(method("GET"))
            .and(path("/api/support/ticket/6/audit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audit": []})))
            .expect(1)
            .mount(&h.backend)
            .await;

        let (status, body) = send_get(&h, "/audit?ticketId=6").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], json!(1));

        let (status, _) = send_get(&h, "/audit?ticketId=six").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    async fn send_get(h: &Harness, uri: &str) -> (StatusCode, serde_json::Value) {
        crate::tests::support::send(&h.router, get(uri)).await
    }
}
