use std::sync::Arc;

use crate::config::TrackerKind;

use super::{JiraClient, TicketClient, TicketClientError, TrackerServerConfig};

/// Builds ticket clients for tracker servers.
pub trait TicketClientFactory: Send + Sync {
    fn build(
        &self,
        server: &TrackerServerConfig,
    ) -> Result<Arc<dyn TicketClient>, TicketClientError>;
}

/// Factory dispatching on the server's `kind`.
#[derive(Debug, Clone, Default)]
pub struct DefaultTicketClientFactory;

impl TicketClientFactory for DefaultTicketClientFactory {
    fn build(
        &self,
        server: &TrackerServerConfig,
    ) -> Result<Arc<dyn TicketClient>, TicketClientError> {
        match server.kind {
            TrackerKind::Jira => Ok(Arc::new(JiraClient::new(server)?)),
        }
    }
}
