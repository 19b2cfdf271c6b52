//! Core ticket data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A vulnerability ticket as seen in a tracker.
///
/// `finding_id` and `team_id` are only meaningful when creating a ticket:
/// trackers do not store them as fields, they end up embedded in the
/// description. Tickets read back from a tracker leave them empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Tracker internal identifier.
    #[serde(default)]
    pub id: String,
    /// Human readable key (e.g., "SEC-42").
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub finding_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    /// Tracker project key.
    #[serde(default)]
    pub project: String,
    /// Current status name, as the tracker reports it.
    #[serde(default)]
    pub status: String,
    /// Issue type (e.g., "Vulnerability").
    #[serde(default)]
    pub ticket_type: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Browser URL of the ticket.
    #[serde(default)]
    pub url_tracker: String,
}

/// A status change the tracker currently allows for a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: String,
    /// Name of the status the transition leads to.
    pub to_name: String,
}

impl Transition {
    pub fn new(id: impl Into<String>, to_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            to_name: to_name.into(),
        }
    }
}

/// Local index row linking a finding and a team to a tracker ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingTicket {
    pub id: String,
    pub finding_id: String,
    pub team_id: String,
    /// Tracker key of the linked ticket.
    pub ticket_key: String,
    pub url_tracker: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_deserializes_with_missing_fields() {
        let ticket: Ticket = serde_json::from_str(r#"{"key": "SEC-1", "status": "Open"}"#).unwrap();
        assert_eq!(ticket.key, "SEC-1");
        assert_eq!(ticket.status, "Open");
        assert!(ticket.labels.is_empty());
        assert!(ticket.resolution.is_none());
    }

    #[test]
    fn test_ticket_serializes_snake_case() {
        let ticket = Ticket {
            key: "SEC-1".to_string(),
            ticket_type: "Vulnerability".to_string(),
            url_tracker: "https://jira.example.com/browse/SEC-1".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["ticket_type"], "Vulnerability");
        assert_eq!(json["url_tracker"], "https://jira.example.com/browse/SEC-1");
        assert!(json["resolution"].is_null());
    }
}
