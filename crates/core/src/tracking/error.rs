use thiserror::Error;

use crate::secrets::CredentialError;
use crate::ticket::FindingTicketError;
use crate::tracker_client::TicketClientError;

/// Errors of ticket tracking operations.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Ticket {ticket} could not reach status '{expected}', it is in '{actual}'")]
    UnreachableStatus {
        ticket: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Tracker error: {0}")]
    Tracker(TicketClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] FindingTicketError),

    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TrackingError {
    /// HTTP status code for API responses.
    pub fn status_code(&self) -> u16 {
        match self {
            TrackingError::NotFound { .. } => 404,
            TrackingError::Credentials(_) => 401,
            TrackingError::Tracker(_) | TrackingError::UnreachableStatus { .. } => 502,
            TrackingError::InvalidWorkflow(_)
            | TrackingError::Storage(_)
            | TrackingError::Configuration(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TrackingError::NotFound { .. })
    }
}

impl From<TicketClientError> for TrackingError {
    fn from(err: TicketClientError) -> Self {
        match err {
            TicketClientError::NotFound(id) => TrackingError::NotFound {
                resource: "ticket",
                id,
            },
            other => TrackingError::Tracker(other),
        }
    }
}
