use std::sync::Arc;

use tracing::debug;

use crate::secrets::CredentialProvider;
use crate::ticket::Ticket;
use crate::tracker_client::{TicketClientFactory, TrackerServerConfig};
use crate::workflow::WorkflowEngine;

use super::{ConfigStore, ProjectConfig, TrackingError};

/// The project of a team together with an engine for its tracker.
pub struct TeamTracker {
    pub project: ProjectConfig,
    pub engine: WorkflowEngine,
}

impl TeamTracker {
    /// Create the ticket of a finding in the team's project, or return the
    /// one that already exists.
    pub async fn create_or_find_ticket(
        &self,
        finding_id: &str,
        summary: &str,
        description: &str,
        labels: &[String],
    ) -> Result<Ticket, TrackingError> {
        let ticket = Ticket {
            team_id: self.project.team_id.clone(),
            finding_id: finding_id.to_string(),
            summary: summary.to_string(),
            description: description.to_string(),
            project: self.project.project.clone(),
            ticket_type: self.project.vulnerability_issue_type.clone(),
            labels: labels.to_vec(),
            ..Default::default()
        };

        self.engine.create_or_find(&ticket).await
    }
}

/// Resolves teams to their tracker.
pub struct TicketServer {
    store: Arc<dyn ConfigStore>,
    credentials: Arc<dyn CredentialProvider>,
    factory: Arc<dyn TicketClientFactory>,
}

impl TicketServer {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        credentials: Arc<dyn CredentialProvider>,
        factory: Arc<dyn TicketClientFactory>,
    ) -> Self {
        Self {
            store,
            credentials,
            factory,
        }
    }

    /// Project configuration of a team.
    pub async fn project_config(&self, team_id: &str) -> Result<ProjectConfig, TrackingError> {
        self.store
            .project_by_team(team_id)
            .await?
            .ok_or_else(|| TrackingError::NotFound {
                resource: "project",
                id: team_id.to_string(),
            })
    }

    /// Connection settings of a tracker server, credentials included.
    pub async fn server_config(&self, server_id: &str) -> Result<TrackerServerConfig, TrackingError> {
        let server = self
            .store
            .server(server_id)
            .await?
            .ok_or_else(|| TrackingError::NotFound {
                resource: "server",
                id: server_id.to_string(),
            })?;

        let credentials = self.credentials.server_credentials(server_id).await?;
        debug!(
            server_id = %server_id,
            provider = self.credentials.name(),
            "Resolved tracker credentials"
        );

        Ok(TrackerServerConfig {
            id: server.id,
            name: server.name,
            url: server.url,
            kind: server.kind,
            user: credentials.user,
            token: credentials.token,
        })
    }

    /// Project and workflow engine for a team.
    pub async fn tracker_for_team(&self, team_id: &str) -> Result<TeamTracker, TrackingError> {
        let project = self.project_config(team_id).await?;
        self.tracker_for_project(project).await
    }

    /// Workflow engine for an already resolved project.
    pub async fn tracker_for_project(
        &self,
        project: ProjectConfig,
    ) -> Result<TeamTracker, TrackingError> {
        let server = self.server_config(&project.server_id).await?;
        let client = self.factory.build(&server)?;

        Ok(TeamTracker {
            project,
            engine: WorkflowEngine::new(client),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use crate::secrets::ConfigCredentialProvider;
    use crate::testing::{MockTicketClient, MockTicketClientFactory};
    use crate::tracking::TomlConfigStore;

    fn ticket_server(config: &str) -> (TicketServer, Arc<MockTicketClientFactory>) {
        let config = load_config_from_str(config).unwrap();
        let factory = Arc::new(MockTicketClientFactory::new(Arc::new(MockTicketClient::new())));
        let server = TicketServer::new(
            Arc::new(TomlConfigStore::from_config(&config)),
            Arc::new(ConfigCredentialProvider::from_config(&config)),
            factory.clone(),
        );
        (server, factory)
    }

    const CONFIG: &str = r#"
[servers.jira]
name = "Jira"
url = "https://jira.example.com"
user = "bot"
token = "secret"

[servers.locked]
name = "No credentials"
url = "https://locked.example.com"

[projects.sec]
name = "Security"
team_id = "team-a"
server_id = "jira"
project = "SEC"
vulnerability_issue_type = "Vulnerability"
fix_workflow = ["Resolved"]
wont_fix_workflow = ["Resolved"]

[projects.ops]
name = "Ops"
team_id = "team-b"
server_id = "locked"
project = "OPS"
vulnerability_issue_type = "Bug"
"#;

    #[tokio::test]
    async fn test_tracker_for_team_builds_client_with_credentials() {
        let (server, factory) = ticket_server(CONFIG);

        let tracker = server.tracker_for_team("team-a").await.unwrap();

        assert_eq!(tracker.project.project, "SEC");
        let built = factory.built_servers().await;
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].url, "https://jira.example.com");
        assert_eq!(built[0].user.as_deref(), Some("bot"));
        assert_eq!(built[0].token, "secret");
    }

    #[tokio::test]
    async fn test_create_or_find_ticket_uses_project_settings() {
        let (server, factory) = ticket_server(CONFIG);
        let tracker = server.tracker_for_team("team-a").await.unwrap();

        let ticket = tracker
            .create_or_find_ticket("f-1", "Outdated TLS", "details", &["tls".to_string()])
            .await
            .unwrap();

        assert_eq!(ticket.project, "SEC");
        assert_eq!(ticket.ticket_type, "Vulnerability");
        assert_eq!(ticket.labels, vec!["tls".to_string()]);
        assert_eq!(ticket.finding_id, "f-1");
        assert_eq!(ticket.team_id, "team-a");
        assert_eq!(factory.client().ticket_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_team_is_not_found() {
        let (server, _) = ticket_server(CONFIG);

        let err = server.tracker_for_team("team-z").await.err().unwrap();
        assert!(matches!(err, TrackingError::NotFound { resource: "project", .. }));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_an_error() {
        let (server, factory) = ticket_server(CONFIG);

        let err = server.tracker_for_team("team-b").await.err().unwrap();
        assert!(matches!(err, TrackingError::Credentials(_)));
        assert!(factory.built_servers().await.is_empty());
    }
}
