//! Finding ticket index trait and types.

use thiserror::Error;

use super::FindingTicket;

/// Error type for finding ticket index operations.
#[derive(Debug, Error)]
pub enum FindingTicketError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to record a finding → ticket link.
#[derive(Debug, Clone)]
pub struct NewFindingTicket {
    pub finding_id: String,
    pub team_id: String,
    pub ticket_key: String,
    pub url_tracker: String,
}

/// Trait for finding ticket index backends.
///
/// `(finding_id, team_id)` is unique: recording a link that already exists
/// keeps the stored row and returns it.
pub trait FindingTicketStore: Send + Sync {
    /// Record a link, or return the existing one.
    fn upsert(&self, request: NewFindingTicket) -> Result<FindingTicket, FindingTicketError>;

    /// Point an existing link at another ticket.
    /// Returns `None` when there is no link for the finding in the team.
    fn relink(
        &self,
        request: NewFindingTicket,
    ) -> Result<Option<FindingTicket>, FindingTicketError>;

    /// Look up the link for a finding in a team.
    fn find(
        &self,
        finding_id: &str,
        team_id: &str,
    ) -> Result<Option<FindingTicket>, FindingTicketError>;

    /// Number of recorded links.
    fn count(&self) -> Result<i64, FindingTicketError>;
}
