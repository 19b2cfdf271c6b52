//! Workflow state machine.
//!
//! A workflow is an ordered list of status names ending in the terminal
//! status. Advancing a ticket walks the part of the list after its current
//! status, executing whichever transition the tracker offers towards each
//! step. Steps the tracker does not offer are skipped, which lets boards that
//! jump straight to the terminal status work with longer workflows.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::metrics;
use crate::ticket::Ticket;
use crate::tracker_client::TicketClient;
use crate::tracking::TrackingError;

use super::description::{description_with_marker, identification_text};

/// Resolution set when a ticket reaches the end of the fix workflow.
pub const FIXED_RESOLUTION: &str = "Done";

/// Resolution set when a finding is discarded as a false positive.
pub const WONT_FIX_RESOLUTION: &str = "Won't Do";

/// Drives tickets of one tracker through workflows.
pub struct WorkflowEngine {
    client: Arc<dyn TicketClient>,
}

impl WorkflowEngine {
    pub fn new(client: Arc<dyn TicketClient>) -> Self {
        Self { client }
    }

    /// The tracker client this engine drives.
    pub fn client(&self) -> &Arc<dyn TicketClient> {
        &self.client
    }

    /// Move a ticket to the last status of `workflow`, resolved as done.
    pub async fn advance_to_fixed(
        &self,
        id: &str,
        workflow: &[String],
    ) -> Result<Ticket, TrackingError> {
        self.advance(id, workflow, FIXED_RESOLUTION).await
    }

    /// Move a ticket to the last status of `workflow`, resolved with `reason`.
    pub async fn advance_to_wont_fix(
        &self,
        id: &str,
        workflow: &[String],
        reason: &str,
    ) -> Result<Ticket, TrackingError> {
        self.advance(id, workflow, reason).await
    }

    async fn advance(
        &self,
        id: &str,
        workflow: &[String],
        resolution: &str,
    ) -> Result<Ticket, TrackingError> {
        let Some(last) = workflow.last() else {
            return Err(TrackingError::InvalidWorkflow(
                "workflow has no statuses".to_string(),
            ));
        };

        let ticket = self.client.get(id).await?;
        if ticket.status == *last {
            debug!(ticket = %id, status = %last, "Ticket already in terminal status");
            return Ok(ticket);
        }

        let mut current = ticket.status;
        for target in remaining_steps(workflow, &current) {
            if *target == current {
                continue;
            }

            let transitions = self.client.list_transitions(id).await?;
            let Some(transition) = transitions.iter().find(|t| t.to_name == *target) else {
                warn!(
                    ticket = %id,
                    status = %current,
                    target = %target,
                    "No transition available towards workflow status, skipping"
                );
                metrics::TRANSITIONS_SKIPPED
                    .with_label_values(&[target.as_str()])
                    .inc();
                continue;
            };

            if target == last {
                self.client
                    .do_transition_with_resolution(id, &transition.id, resolution)
                    .await?;
            } else {
                self.client.do_transition(id, &transition.id).await?;
            }
            metrics::TRANSITIONS_EXECUTED
                .with_label_values(&[target.as_str()])
                .inc();
            debug!(ticket = %id, from = %current, to = %target, "Transition executed");
            current = target.clone();
        }

        let ticket = self.client.get(id).await?;
        if ticket.status != *last {
            return Err(TrackingError::UnreachableStatus {
                ticket: id.to_string(),
                expected: last.clone(),
                actual: ticket.status,
            });
        }

        info!(ticket = %id, status = %last, resolution = %resolution, "Ticket advanced");
        Ok(ticket)
    }

    /// Return the ticket of `ticket.finding_id` in `ticket.team_id`, creating it
    /// when the tracker has none.
    ///
    /// Existing tickets are recognised by the identification block embedded in
    /// their description.
    pub async fn create_or_find(&self, ticket: &Ticket) -> Result<Ticket, TrackingError> {
        let text = identification_text(&ticket.finding_id, &ticket.team_id);

        let found = self
            .client
            .find(&ticket.project, &ticket.ticket_type, &text)
            .await?;

        let mut result = match found {
            Some(existing) => {
                metrics::TICKETS_FOUND.inc();
                debug!(
                    finding_id = %ticket.finding_id,
                    team_id = %ticket.team_id,
                    ticket = %existing.key,
                    "Found existing ticket"
                );
                existing
            }
            None => {
                let mut new_ticket = ticket.clone();
                new_ticket.description =
                    description_with_marker(&ticket.description, &ticket.finding_id, &ticket.team_id);

                let created = self.client.create(&new_ticket).await?;
                metrics::TICKETS_CREATED.inc();
                info!(
                    finding_id = %ticket.finding_id,
                    team_id = %ticket.team_id,
                    ticket = %created.key,
                    "Created ticket"
                );
                created
            }
        };

        result.finding_id = ticket.finding_id.clone();
        result.team_id = ticket.team_id.clone();
        Ok(result)
    }
}

/// Steps left to walk from `status`.
///
/// A multi-step workflow is cut to the suffix starting at the current status;
/// when the status is not part of the workflow the whole list is walked.
/// A single-step workflow means "resolve from any status" and is never cut.
fn remaining_steps<'a>(workflow: &'a [String], status: &str) -> &'a [String] {
    if workflow.len() > 1 {
        if let Some(pos) = workflow.iter().position(|s| s == status) {
            return &workflow[pos..];
        }
    }
    workflow
}
