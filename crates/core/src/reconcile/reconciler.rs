//! Applies finding notifications to the tickets of every owning team.
//!
//! For each team of the finding target the reconciler resolves the team
//! project, makes sure the finding has a ticket (looking it up in the
//! finding ticket index first) and, when the finding is fixed or discarded,
//! walks the ticket through the matching workflow. The first failing team
//! aborts the message so the stream redelivers it; every step is idempotent
//! so teams that already succeeded are cheap to replay.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{
    FindingHandler, FindingNotification, FindingStreamError, STATUS_FALSE_POSITIVE, STATUS_FIXED,
};
use crate::metrics;
use crate::ticket::{FindingTicketStore, NewFindingTicket, Ticket};
use crate::tracker_client::TicketClientError;
use crate::tracking::{normalize_team_id, TeamTracker, TicketServer, TrackingError};
use crate::workflow::WONT_FIX_RESOLUTION;

/// What happened to a finding for one team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamOutcome {
    /// The ticket reached the end of the fix workflow.
    Fixed,
    /// The ticket reached the end of the won't fix workflow.
    WontFix,
    /// The ticket exists, the finding status needs no transition.
    NoAction,
    /// The team has no project configured.
    SkippedUnconfigured,
    /// The team project does not create tickets automatically.
    SkippedDisabled,
}

impl TeamOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamOutcome::Fixed => "fixed",
            TeamOutcome::WontFix => "wont_fix",
            TeamOutcome::NoAction => "no_action",
            TeamOutcome::SkippedUnconfigured => "skipped_unconfigured",
            TeamOutcome::SkippedDisabled => "skipped_disabled",
        }
    }
}

/// Keeps tracker tickets in line with finding notifications.
pub struct FindingReconciler {
    tickets: Arc<TicketServer>,
    index: Arc<dyn FindingTicketStore>,
}

impl FindingReconciler {
    pub fn new(tickets: Arc<TicketServer>, index: Arc<dyn FindingTicketStore>) -> Self {
        Self { tickets, index }
    }

    /// Reconcile `finding` for a single team.
    pub async fn reconcile_team(
        &self,
        finding: &FindingNotification,
        team_id: &str,
    ) -> Result<TeamOutcome, TrackingError> {
        let project = match self.tickets.project_config(team_id).await {
            Ok(project) => project,
            Err(e) if e.is_not_found() => {
                debug!(finding_id = %finding.id, team_id = %team_id, "Team has no project, skipping");
                return Ok(TeamOutcome::SkippedUnconfigured);
            }
            Err(e) => return Err(e),
        };

        if !project.auto_create {
            debug!(
                finding_id = %finding.id,
                team_id = %team_id,
                project = %project.project,
                "Automatic ticket creation disabled, skipping"
            );
            return Ok(TeamOutcome::SkippedDisabled);
        }

        let tracker = self.tickets.tracker_for_project(project).await?;
        let ticket = self.ensure_ticket(&tracker, finding).await?;

        let outcome = match finding.status.as_str() {
            STATUS_FIXED => {
                tracker
                    .engine
                    .advance_to_fixed(&ticket.key, &tracker.project.fix_workflow)
                    .await?;
                TeamOutcome::Fixed
            }
            STATUS_FALSE_POSITIVE => {
                tracker
                    .engine
                    .advance_to_wont_fix(
                        &ticket.key,
                        &tracker.project.wont_fix_workflow,
                        WONT_FIX_RESOLUTION,
                    )
                    .await?;
                TeamOutcome::WontFix
            }
            _ => TeamOutcome::NoAction,
        };

        Ok(outcome)
    }

    /// The ticket of the finding in the team project, created if needed.
    async fn ensure_ticket(
        &self,
        tracker: &TeamTracker,
        finding: &FindingNotification,
    ) -> Result<Ticket, TrackingError> {
        let team_id = tracker.project.team_id.as_str();

        let Some(link) = self.index.find(&finding.id, team_id)? else {
            let ticket = self.create_or_find(tracker, finding).await?;
            self.index.upsert(NewFindingTicket {
                finding_id: finding.id.clone(),
                team_id: team_id.to_string(),
                ticket_key: ticket.key.clone(),
                url_tracker: ticket.url_tracker.clone(),
            })?;
            return Ok(ticket);
        };

        match tracker.engine.client().get(&link.ticket_key).await {
            Ok(ticket) => Ok(ticket),
            Err(TicketClientError::NotFound(_)) => {
                warn!(
                    finding_id = %finding.id,
                    team_id = %team_id,
                    ticket = %link.ticket_key,
                    "Indexed ticket no longer exists, relinking"
                );
                let ticket = self.create_or_find(tracker, finding).await?;
                self.index.relink(NewFindingTicket {
                    finding_id: finding.id.clone(),
                    team_id: team_id.to_string(),
                    ticket_key: ticket.key.clone(),
                    url_tracker: ticket.url_tracker.clone(),
                })?;
                Ok(ticket)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_or_find(
        &self,
        tracker: &TeamTracker,
        finding: &FindingNotification,
    ) -> Result<Ticket, TrackingError> {
        tracker
            .create_or_find_ticket(
                &finding.id,
                &finding.issue.summary,
                &finding.ticket_description(),
                &finding.issue.labels,
            )
            .await
    }
}

#[async_trait]
impl FindingHandler for FindingReconciler {
    async fn handle_finding(
        &self,
        finding_id: &str,
        finding: Option<&FindingNotification>,
    ) -> Result<(), FindingStreamError> {
        let Some(finding) = finding else {
            debug!(finding_id = %finding_id, "Tombstone, nothing to reconcile");
            return Ok(());
        };

        // The message key is the finding ID; the payload wins when both exist.
        let owned;
        let finding = if finding.id.is_empty() {
            owned = FindingNotification {
                id: finding_id.to_string(),
                ..finding.clone()
            };
            &owned
        } else {
            finding
        };

        for team in &finding.target.teams {
            let team_id = normalize_team_id(team);
            match self.reconcile_team(finding, &team_id).await {
                Ok(outcome) => {
                    metrics::FINDINGS_PROCESSED
                        .with_label_values(&[outcome.as_str()])
                        .inc();
                    debug!(
                        finding_id = %finding.id,
                        team_id = %team_id,
                        outcome = outcome.as_str(),
                        "Finding reconciled for team"
                    );
                }
                Err(source) => {
                    metrics::FINDINGS_PROCESSED
                        .with_label_values(&["failed"])
                        .inc();
                    return Err(FindingStreamError::Reconcile {
                        finding_id: finding.id.clone(),
                        team_id,
                        source,
                    });
                }
            }
        }

        info!(
            finding_id = %finding.id,
            status = %finding.status,
            teams = finding.target.teams.len(),
            "Finding processed"
        );
        Ok(())
    }
}
