use std::sync::Arc;
use vulntrack_core::{Config, FindingTicketStore, SanitizedConfig, TicketServer};

/// Shared application state
pub struct AppState {
    config: Config,
    tickets: Arc<TicketServer>,
    finding_tickets: Arc<dyn FindingTicketStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        tickets: Arc<TicketServer>,
        finding_tickets: Arc<dyn FindingTicketStore>,
    ) -> Self {
        Self {
            config,
            tickets,
            finding_tickets,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Resolves teams to their tracker.
    pub fn tickets(&self) -> &TicketServer {
        self.tickets.as_ref()
    }

    /// Local finding to ticket index.
    pub fn finding_tickets(&self) -> &dyn FindingTicketStore {
        self.finding_tickets.as_ref()
    }
}
