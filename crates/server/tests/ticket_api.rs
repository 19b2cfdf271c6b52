//! Ticket API tests against a mock tracker.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestFixture, SERVER_TOKEN, TEAM_ID, UNKNOWN_TEAM_ID};
use vulntrack_core::testing::MockOperation;

async fn create_ticket(fixture: &TestFixture, finding_id: &str) -> common::TestResponse {
    fixture
        .post(
            &fixture.tickets_path(),
            json!({
                "finding_id": finding_id,
                "summary": "Outdated TLS protocol",
                "description": "TLS 1.0 is enabled on the public endpoint.",
                "labels": ["tls"]
            }),
        )
        .await
}

#[tokio::test]
async fn test_healthcheck() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/healthcheck").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_invalid_team_id_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/not-a-uuid/tickets/SEC-1").await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("Invalid team ID"));
    assert!(fixture.tracker.calls().await.is_empty());
}

#[tokio::test]
async fn test_unknown_team_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            &format!("/{UNKNOWN_TEAM_ID}/tickets"),
            json!({ "finding_id": "f-1", "summary": "Outdated TLS protocol" }),
        )
        .await;

    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(fixture.tracker.calls().await.is_empty());
}

#[tokio::test]
async fn test_create_ticket_links_finding() {
    let fixture = TestFixture::new().await;

    let response = create_ticket(&fixture, "f-1").await;

    assert_status!(response, StatusCode::OK);
    let ticket = &response.body["ticket"];
    assert_eq!(ticket["project"], "SEC");
    assert_eq!(ticket["ticket_type"], "Vulnerability");
    assert_eq!(ticket["status"], "To Do");
    assert_eq!(ticket["finding_id"], "f-1");
    assert_eq!(ticket["team_id"], TEAM_ID);
    let key = ticket["key"].as_str().unwrap().to_string();

    let link = fixture
        .finding_tickets
        .find("f-1", TEAM_ID)
        .unwrap()
        .expect("finding should be indexed");
    assert_eq!(link.ticket_key, key);
    assert_eq!(link.url_tracker, ticket["url_tracker"].as_str().unwrap());
}

#[tokio::test]
async fn test_create_ticket_twice_returns_same_ticket() {
    let fixture = TestFixture::new().await;

    let first = create_ticket(&fixture, "f-1").await;
    let second = create_ticket(&fixture, "f-1").await;

    assert_status!(second, StatusCode::OK);
    assert_eq!(first.body["ticket"]["key"], second.body["ticket"]["key"]);
    assert_eq!(fixture.tracker.ticket_count().await, 1);
    assert_eq!(fixture.tracker.count_calls(MockOperation::Create).await, 1);
    assert_eq!(fixture.finding_tickets.count().unwrap(), 1);
}

#[tokio::test]
async fn test_create_ticket_with_uppercase_team_id() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            &format!("/{}/tickets", TEAM_ID.to_uppercase()),
            json!({ "finding_id": "f-1", "summary": "Outdated TLS protocol" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert!(fixture.finding_tickets.find("f-1", TEAM_ID).unwrap().is_some());
}

#[tokio::test]
async fn test_uppercase_configured_team_id_is_reachable() {
    let fixture = TestFixture::with_configured_team_id(&TEAM_ID.to_uppercase()).await;

    let created = create_ticket(&fixture, "f-1").await;
    assert_status!(created, StatusCode::OK);
    assert_eq!(created.body["ticket"]["team_id"], TEAM_ID);

    let found = fixture
        .get(&format!("/{TEAM_ID}/tickets/findings/f-1"))
        .await;
    assert_status!(found, StatusCode::OK);
    assert_eq!(found.body["finding_ticket"]["team_id"], TEAM_ID);
}

#[tokio::test]
async fn test_create_ticket_requires_summary() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            &fixture.tickets_path(),
            json!({ "finding_id": "f-1", "summary": "  " }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(fixture.tracker.ticket_count().await, 0);
}

#[tokio::test]
async fn test_create_ticket_rejects_malformed_json() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_raw(&fixture.tickets_path(), "{\"finding_id\": ")
        .await;

    assert!(response.status.is_client_error());
    assert_eq!(fixture.tracker.ticket_count().await, 0);
}

#[tokio::test]
async fn test_get_ticket() {
    let fixture = TestFixture::new().await;
    let created = create_ticket(&fixture, "f-1").await;
    let key = created.body["ticket"]["key"].as_str().unwrap();

    let response = fixture.get(&format!("/{TEAM_ID}/tickets/{key}")).await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["ticket"]["key"], key);
    assert_eq!(response.body["ticket"]["summary"], "Outdated TLS protocol");
}

#[tokio::test]
async fn test_get_missing_ticket_is_not_found() {
    let fixture = TestFixture::new().await;

    let response = fixture.get(&format!("/{TEAM_ID}/tickets/SEC-999")).await;

    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fix_ticket_walks_fix_workflow() {
    let fixture = TestFixture::new().await;
    let created = create_ticket(&fixture, "f-1").await;
    let key = created.body["ticket"]["key"].as_str().unwrap();

    let response = fixture
        .post_empty(&format!("/{TEAM_ID}/tickets/{key}/fix"))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["ticket"]["status"], "Resolved");
    assert_eq!(response.body["ticket"]["resolution"], "Done");
    assert_eq!(
        fixture.tracker.count_calls(MockOperation::DoTransition).await,
        2
    );
}

#[tokio::test]
async fn test_fix_resolved_ticket_makes_no_transition() {
    let fixture = TestFixture::new().await;
    let created = create_ticket(&fixture, "f-1").await;
    let key = created.body["ticket"]["key"].as_str().unwrap();
    let path = format!("/{TEAM_ID}/tickets/{key}/fix");

    fixture.post_empty(&path).await;
    fixture.tracker.clear_calls().await;
    let response = fixture.post_empty(&path).await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(
        fixture.tracker.count_calls(MockOperation::DoTransition).await,
        0
    );
}

#[tokio::test]
async fn test_wont_fix_uses_default_reason() {
    let fixture = TestFixture::new().await;
    let created = create_ticket(&fixture, "f-1").await;
    let key = created.body["ticket"]["key"].as_str().unwrap();

    let response = fixture
        .post_empty(&format!("/{TEAM_ID}/tickets/{key}/wontfix"))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["ticket"]["status"], "Resolved");
    assert_eq!(response.body["ticket"]["resolution"], "Won't Do");
}

#[tokio::test]
async fn test_wont_fix_with_custom_reason() {
    let fixture = TestFixture::new().await;
    let created = create_ticket(&fixture, "f-1").await;
    let key = created.body["ticket"]["key"].as_str().unwrap();

    let response = fixture
        .post(
            &format!("/{TEAM_ID}/tickets/{key}/wontfix"),
            json!({ "reason": "Accepted risk" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["ticket"]["resolution"], "Accepted risk");
}

#[tokio::test]
async fn test_wont_fix_rejects_malformed_body() {
    let fixture = TestFixture::new().await;
    let created = create_ticket(&fixture, "f-1").await;
    let key = created.body["ticket"]["key"].as_str().unwrap();
    fixture.tracker.clear_calls().await;

    let response = fixture
        .post_raw(&format!("/{TEAM_ID}/tickets/{key}/wontfix"), "not json")
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(fixture.tracker.calls().await.is_empty());
}

#[tokio::test]
async fn test_finding_ticket_lookup() {
    let fixture = TestFixture::new().await;

    let missing = fixture
        .get(&format!("/{TEAM_ID}/tickets/findings/f-1"))
        .await;
    assert_status!(missing, StatusCode::NOT_FOUND);

    let created = create_ticket(&fixture, "f-1").await;
    let found = fixture
        .get(&format!("/{TEAM_ID}/tickets/findings/f-1"))
        .await;

    assert_status!(found, StatusCode::OK);
    assert_eq!(found.body["finding_ticket"]["finding_id"], "f-1");
    assert_eq!(found.body["finding_ticket"]["team_id"], TEAM_ID);
    assert_eq!(
        found.body["finding_ticket"]["ticket_key"],
        created.body["ticket"]["key"]
    );
}

#[tokio::test]
async fn test_tracker_failure_is_bad_gateway() {
    let fixture = TestFixture::new().await;
    fixture.tracker.fail_always(MockOperation::Create).await;

    let response = create_ticket(&fixture, "f-1").await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert!(fixture.finding_tickets.find("f-1", TEAM_ID).unwrap().is_none());
}

#[tokio::test]
async fn test_config_hides_tokens() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(
        response.body["servers"]["jira-main"]["token_configured"],
        true
    );
    assert_eq!(response.body["projects"]["security"]["team_id"], TEAM_ID);
    assert!(!response.text.contains(SERVER_TOKEN));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    create_ticket(&fixture, "f-1").await;

    let response = fixture.get("/metrics").await;

    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("vulntrack_http_requests_total"));
    assert!(response.text.contains("vulntrack_finding_tickets"));
    assert!(response.text.contains("vulntrack_tickets_created_total"));
}
