//! Testing utilities and mock implementations.
//!
//! This module provides a mock ticket tracker and finding fixtures, allowing
//! end-to-end tests of the stream and the API without a real tracker or
//! message bus.
//!
//! # Example
//!
//! ```rust,ignore
//! use vulntrack_core::testing::{fixtures, MockTicketClient, MockTicketClientFactory};
//!
//! let client = Arc::new(MockTicketClient::new());
//! client.set_linear_workflow(&["To Do", "In Progress", "Resolved"]).await;
//! let factory = Arc::new(MockTicketClientFactory::new(client.clone()));
//!
//! let finding = fixtures::finding_notification("f-1", "FIXED", &["team-a"]);
//! ```

mod mock_ticket_client;

pub use mock_ticket_client::{
    MockCall, MockOperation, MockTicketClient, MockTicketClientFactory, MOCK_INITIAL_STATUS,
    MOCK_TRACKER_URL,
};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::events::{FindingNotification, Issue, Message, Target, VERSION_HEADER};

    /// Payload version stamped on fixture messages.
    pub const FIXTURE_VERSION: &str = "0.0.1";

    /// Create a test finding with reasonable defaults.
    pub fn finding_notification(id: &str, status: &str, teams: &[&str]) -> FindingNotification {
        FindingNotification {
            id: id.to_string(),
            affected_resource: "example.com:443".to_string(),
            score: 7.5,
            status: status.to_string(),
            details: "TLS 1.0 is enabled.".to_string(),
            issue: Issue {
                id: format!("issue-{id}"),
                summary: "Outdated TLS protocol".to_string(),
                cwe_id: 326,
                description: "The server accepts deprecated TLS versions.".to_string(),
                recommendations: vec!["Disable TLS 1.0 and 1.1.".to_string()],
                reference_links: vec!["https://example.com/tls".to_string()],
                labels: vec!["tls".to_string(), "network".to_string()],
            },
            target: Target {
                id: format!("target-{id}"),
                identifier: "example.com".to_string(),
                teams: teams.iter().map(|t| t.to_string()).collect(),
            },
            ..Default::default()
        }
    }

    /// A stream message carrying `finding`, keyed by its ID.
    pub fn finding_message(finding: &FindingNotification) -> Message {
        let value = serde_json::to_vec(finding).unwrap_or_default();
        Message::new(Some(finding.id.as_str()), Some(value)).with_header(VERSION_HEADER, FIXTURE_VERSION)
    }

    /// A finding message encoded the way the Go producer writes it: every
    /// empty slice is `null` and the source time is Go's zero time.
    pub fn go_finding_message(id: &str, status: &str, teams: &[&str]) -> Message {
        let value = serde_json::json!({
            "id": id,
            "affected_resource": "example.com:443",
            "score": 7.5,
            "status": status,
            "details": "",
            "impact_details": "",
            "issue": {
                "id": format!("issue-{id}"),
                "summary": "Outdated TLS protocol",
                "cwe_id": 326,
                "description": "",
                "recommendations": null,
                "reference_links": null,
                "labels": null
            },
            "target": {
                "id": format!("target-{id}"),
                "identifier": "example.com",
                "teams": teams
            },
            "source": {
                "id": "",
                "instance": "",
                "options": "",
                "time": "0001-01-01T00:00:00Z",
                "name": "",
                "component": ""
            },
            "resources": null,
            "total_exposure": 0,
            "current_exposure": 0
        });
        Message::new(Some(id), Some(value.to_string())).with_header(VERSION_HEADER, FIXTURE_VERSION)
    }

    /// A tombstone for finding `id`.
    pub fn tombstone_message(id: &str) -> Message {
        Message::new(Some(id), None::<Vec<u8>>).with_header(VERSION_HEADER, FIXTURE_VERSION)
    }

    /// Five findings of one team, with a mix of statuses.
    pub fn findings_messages() -> Vec<Message> {
        [
            ("f-1", "OPEN"),
            ("f-2", "FIXED"),
            ("f-3", "FALSE POSITIVE"),
            ("f-4", "OPEN"),
            ("f-5", "FIXED"),
        ]
        .iter()
        .map(|(id, status)| finding_message(&finding_notification(id, status, &["team-a"])))
        .collect()
    }
}
