//! Ticket API handlers.
//!
//! Every route is scoped to a team, identified by a UUID. Ticket ids are the
//! tracker's ids or keys.

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use vulntrack_core::{
    ticket::NewFindingTicket, workflow::WONT_FIX_RESOLUTION, FindingTicket, Ticket,
};

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a ticket
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub finding_id: String,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Optional request body for closing a ticket as won't fix
#[derive(Debug, Default, Deserialize)]
pub struct WontFixBody {
    /// Resolution to set (defaults to "Won't Do")
    pub reason: Option<String>,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub ticket: Ticket,
}

/// Response for finding ticket lookups
#[derive(Debug, Serialize)]
pub struct FindingTicketResponse {
    pub finding_ticket: FindingTicket,
}

/// Parse and normalize a team ID.
fn team_id(raw: &str) -> Result<String, ApiError> {
    Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::bad_request(format!("Invalid team ID: {raw}")))
}

// ============================================================================
// Handlers
// ============================================================================

/// Get a ticket from the team's tracker
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path((team_id_raw, id)): Path<(String, String)>,
) -> Result<Json<TicketResponse>, ApiError> {
    let team_id = team_id(&team_id_raw)?;
    let tracker = state.tickets().tracker_for_team(&team_id).await?;

    let ticket = tracker
        .engine
        .client()
        .get(&id)
        .await
        .map_err(vulntrack_core::TrackingError::from)?;

    Ok(Json(TicketResponse { ticket }))
}

/// Create the ticket of a finding, or return the existing one
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Path(team_id_raw): Path<String>,
    Json(body): Json<CreateTicketBody>,
) -> Result<Json<TicketResponse>, ApiError> {
    let team_id = team_id(&team_id_raw)?;
    if body.finding_id.trim().is_empty() {
        return Err(ApiError::bad_request("finding_id is required"));
    }
    if body.summary.trim().is_empty() {
        return Err(ApiError::bad_request("summary is required"));
    }

    let tracker = state.tickets().tracker_for_team(&team_id).await?;
    let ticket = tracker
        .create_or_find_ticket(&body.finding_id, &body.summary, &body.description, &body.labels)
        .await?;

    state.finding_tickets().upsert(NewFindingTicket {
        finding_id: body.finding_id.clone(),
        team_id: team_id.clone(),
        ticket_key: ticket.key.clone(),
        url_tracker: ticket.url_tracker.clone(),
    })?;

    info!(
        team_id = %team_id,
        finding_id = %body.finding_id,
        ticket = %ticket.key,
        "Ticket created or found via API"
    );
    Ok(Json(TicketResponse { ticket }))
}

/// Move a ticket through the team's fix workflow
pub async fn fix_ticket(
    State(state): State<Arc<AppState>>,
    Path((team_id_raw, id)): Path<(String, String)>,
) -> Result<Json<TicketResponse>, ApiError> {
    let team_id = team_id(&team_id_raw)?;
    let tracker = state.tickets().tracker_for_team(&team_id).await?;

    let ticket = tracker
        .engine
        .advance_to_fixed(&id, &tracker.project.fix_workflow)
        .await?;

    Ok(Json(TicketResponse { ticket }))
}

/// Move a ticket through the team's won't fix workflow
pub async fn wont_fix_ticket(
    State(state): State<Arc<AppState>>,
    Path((team_id_raw, id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<TicketResponse>, ApiError> {
    let team_id = team_id(&team_id_raw)?;

    let body: WontFixBody = if body.is_empty() {
        WontFixBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?
    };
    let reason = body
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| WONT_FIX_RESOLUTION.to_string());

    let tracker = state.tickets().tracker_for_team(&team_id).await?;
    let ticket = tracker
        .engine
        .advance_to_wont_fix(&id, &tracker.project.wont_fix_workflow, &reason)
        .await?;

    Ok(Json(TicketResponse { ticket }))
}

/// Look up the ticket linked to a finding in the local index
pub async fn get_finding_ticket(
    State(state): State<Arc<AppState>>,
    Path((team_id_raw, finding_id)): Path<(String, String)>,
) -> Result<Json<FindingTicketResponse>, ApiError> {
    let team_id = team_id(&team_id_raw)?;

    let finding_ticket = state
        .finding_tickets()
        .find(&finding_id, &team_id)?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "No ticket for finding {finding_id} in team {team_id}"
            ))
        })?;

    Ok(Json(FindingTicketResponse { finding_ticket }))
}
