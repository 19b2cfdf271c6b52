//! Common test utilities for API testing with a mock tracker.
//!
//! The fixture builds the real router over a mock ticket client and a
//! temporary SQLite finding ticket index, so requests go through the same
//! handlers, error mapping and middleware as in production.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vulntrack_core::{
    config::{DatabaseConfig, ProjectEntry, ServerConfig, TrackerServerEntry},
    secrets::ConfigCredentialProvider,
    testing::{MockTicketClient, MockTicketClientFactory},
    tracking::TomlConfigStore,
    Config, FindingTicketStore, SqliteFindingTicketStore, TicketServer,
};

/// Team with a configured project.
pub const TEAM_ID: &str = "6b2a5a30-8fb3-4b52-9a53-0e0ab7bfc1e2";

/// Valid team ID without a project.
pub const UNKNOWN_TEAM_ID: &str = "00000000-0000-4000-8000-000000000000";

/// Inline token of the test tracker server.
pub const SERVER_TOKEN: &str = "s3cr3t-token";

/// Test fixture for API testing with a mock tracker.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_ticket_creation() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post(&fixture.tickets_path(), json!({
///         "finding_id": "f-1",
///         "summary": "Outdated TLS protocol"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock tracker behind every team project
    pub tracker: Arc<MockTicketClient>,
    /// Finding ticket index shared with the router
    pub finding_tickets: Arc<dyn FindingTicketStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    /// Raw body, for non JSON endpoints.
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with one team project.
    pub async fn new() -> Self {
        Self::with_configured_team_id(TEAM_ID).await
    }

    /// Create a test fixture whose project declares `team_id` as written.
    pub async fn with_configured_team_id(team_id: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let tracker = Arc::new(MockTicketClient::new());
        tracker
            .set_linear_workflow(&["To Do", "In Progress", "Resolved"])
            .await;
        tracker.set_transition("To Do", "31", "Resolved").await;

        let config = test_config(
            team_id,
            DatabaseConfig {
                path: db_path.clone(),
            },
        );

        let finding_tickets: Arc<dyn FindingTicketStore> = Arc::new(
            SqliteFindingTicketStore::new(&db_path).expect("Failed to create finding ticket store"),
        );
        let tickets = Arc::new(TicketServer::new(
            Arc::new(TomlConfigStore::from_config(&config)),
            Arc::new(ConfigCredentialProvider::from_config(&config)),
            Arc::new(MockTicketClientFactory::new(Arc::clone(&tracker))),
        ));

        let state = Arc::new(vulntrack_server::state::AppState::new(
            config,
            tickets,
            Arc::clone(&finding_tickets),
        ));
        let router = vulntrack_server::api::create_router(state);

        Self {
            router,
            tracker,
            finding_tickets,
            temp_dir,
        }
    }

    /// Path creating tickets for the configured team.
    pub fn tickets_path(&self) -> String {
        format!("/{TEAM_ID}/tickets")
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// One tracker server and one auto-create project for `team_id`.
fn test_config(team_id: &str, database: DatabaseConfig) -> Config {
    let mut servers = BTreeMap::new();
    servers.insert(
        "jira-main".to_string(),
        TrackerServerEntry {
            name: "Main Jira".to_string(),
            url: "https://jira.example.com".to_string(),
            kind: Default::default(),
            user: Some("bot".to_string()),
            token: Some(SERVER_TOKEN.to_string()),
        },
    );

    let mut projects = BTreeMap::new();
    projects.insert(
        "security".to_string(),
        ProjectEntry {
            name: "Security".to_string(),
            team_id: team_id.to_string(),
            server_id: "jira-main".to_string(),
            project: "SEC".to_string(),
            vulnerability_issue_type: "Vulnerability".to_string(),
            fix_workflow: vec![
                "To Do".to_string(),
                "In Progress".to_string(),
                "Resolved".to_string(),
            ],
            wont_fix_workflow: vec!["Resolved".to_string()],
            auto_create: true,
        },
    );

    Config {
        server: ServerConfig {
            host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 8080,
        },
        database,
        servers,
        projects,
        ..Default::default()
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
