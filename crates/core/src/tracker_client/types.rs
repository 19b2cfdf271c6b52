//! Types and traits for ticket tracker clients.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TrackerKind;
use crate::ticket::{Ticket, Transition};

/// Errors from ticket tracker operations.
#[derive(Debug, Error)]
pub enum TicketClientError {
    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Tracker API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid tracker response: {0}")]
    InvalidResponse(String),
}

impl TicketClientError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TicketClientError::NotFound(_) => "not_found",
            TicketClientError::ConnectionFailed(_) => "connection_failed",
            TicketClientError::Timeout => "timeout",
            TicketClientError::Api { .. } => "api",
            TicketClientError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Connection settings of a tracker server, credentials resolved.
#[derive(Debug, Clone)]
pub struct TrackerServerConfig {
    pub id: String,
    pub name: String,
    /// Base URL without the API path.
    pub url: String,
    pub kind: TrackerKind,
    pub user: Option<String>,
    pub token: String,
}

/// Trait for ticket tracker backends.
///
/// Every call is a network round trip. Implementations stamp `url_tracker`
/// on every ticket they return.
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Get a ticket by ID or key.
    async fn get(&self, id: &str) -> Result<Ticket, TicketClientError>;

    /// Find the first ticket of the given project and issue type whose
    /// description contains `text`.
    async fn find(
        &self,
        project: &str,
        issue_type: &str,
        text: &str,
    ) -> Result<Option<Ticket>, TicketClientError>;

    /// Create a ticket and return it as stored by the tracker.
    async fn create(&self, ticket: &Ticket) -> Result<Ticket, TicketClientError>;

    /// Transitions currently available for a ticket.
    async fn list_transitions(&self, id: &str) -> Result<Vec<Transition>, TicketClientError>;

    /// Execute a transition.
    async fn do_transition(&self, id: &str, transition_id: &str) -> Result<(), TicketClientError>;

    /// Execute a transition that also sets the resolution field.
    async fn do_transition_with_resolution(
        &self,
        id: &str,
        transition_id: &str,
        resolution: &str,
    ) -> Result<(), TicketClientError>;
}
