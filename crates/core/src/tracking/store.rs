use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{Config, ProjectEntry, TrackerKind};

use super::TrackingError;

/// Workflow and routing configuration of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectConfig {
    pub id: String,
    pub name: String,
    pub team_id: String,
    pub server_id: String,
    pub project: String,
    pub vulnerability_issue_type: String,
    pub fix_workflow: Vec<String>,
    pub wont_fix_workflow: Vec<String>,
    pub auto_create: bool,
}

impl ProjectConfig {
    fn from_entry(id: &str, entry: &ProjectEntry) -> Self {
        Self {
            id: id.to_string(),
            name: entry.name.clone(),
            team_id: entry.team_id.clone(),
            server_id: entry.server_id.clone(),
            project: entry.project.clone(),
            vulnerability_issue_type: entry.vulnerability_issue_type.clone(),
            fix_workflow: entry.fix_workflow.clone(),
            wont_fix_workflow: entry.wont_fix_workflow.clone(),
            auto_create: entry.auto_create,
        }
    }
}

/// A tracker server as stored, without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub kind: TrackerKind,
}

/// Storage of tracker servers and team projects.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn project_by_team(&self, team_id: &str) -> Result<Option<ProjectConfig>, TrackingError>;

    async fn server(&self, server_id: &str) -> Result<Option<ServerRecord>, TrackingError>;
}

/// Canonical form of a team ID: lowercase hyphenated for UUIDs in any
/// accepted notation, unchanged otherwise.
pub fn normalize_team_id(team_id: &str) -> String {
    Uuid::parse_str(team_id.trim())
        .map(|id| id.to_string())
        .unwrap_or_else(|_| team_id.to_string())
}

/// Servers and projects declared in the TOML configuration.
#[derive(Debug, Clone, Default)]
pub struct TomlConfigStore {
    projects_by_team: HashMap<String, ProjectConfig>,
    servers: HashMap<String, ServerRecord>,
}

impl TomlConfigStore {
    pub fn from_config(config: &Config) -> Self {
        let mut projects_by_team = HashMap::new();
        for (id, entry) in &config.projects {
            let mut project = ProjectConfig::from_entry(id, entry);
            project.team_id = normalize_team_id(&entry.team_id);
            projects_by_team
                .entry(project.team_id.clone())
                .or_insert(project);
        }

        let servers = config
            .servers
            .iter()
            .map(|(id, entry)| {
                (
                    id.clone(),
                    ServerRecord {
                        id: id.clone(),
                        name: entry.name.clone(),
                        url: entry.url.clone(),
                        kind: entry.kind,
                    },
                )
            })
            .collect();

        Self {
            projects_by_team,
            servers,
        }
    }
}

#[async_trait]
impl ConfigStore for TomlConfigStore {
    async fn project_by_team(&self, team_id: &str) -> Result<Option<ProjectConfig>, TrackingError> {
        Ok(self.projects_by_team.get(&normalize_team_id(team_id)).cloned())
    }

    async fn server(&self, server_id: &str) -> Result<Option<ServerRecord>, TrackingError> {
        Ok(self.servers.get(server_id).cloned())
    }
}
