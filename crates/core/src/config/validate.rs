use uuid::Uuid;

use super::{
    types::{Config, StreamBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Every project has a UUID team ID and references a declared server,
///   one project per team
/// - Auto-create projects have both workflows
/// - Stream topic and group are set, Kafka has brokers and is compiled in
/// - An enabled consumer reads from Kafka; the memory bus has no publishers
///   outside the process
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let mut teams = std::collections::HashSet::new();
    for (id, project) in &config.projects {
        let Ok(team_id) = Uuid::parse_str(project.team_id.trim()) else {
            return Err(ConfigError::ValidationError(format!(
                "projects.{id}.team_id '{}' is not a UUID",
                project.team_id
            )));
        };
        if !teams.insert(team_id) {
            return Err(ConfigError::ValidationError(format!(
                "projects.{id}.team_id '{}' is already used by another project",
                project.team_id
            )));
        }

        if !config.servers.contains_key(&project.server_id) {
            return Err(ConfigError::ValidationError(format!(
                "projects.{id}.server_id references unknown server '{}'",
                project.server_id
            )));
        }

        if project.auto_create
            && (project.fix_workflow.is_empty() || project.wont_fix_workflow.is_empty())
        {
            return Err(ConfigError::ValidationError(format!(
                "projects.{id} has auto_create enabled but an empty workflow"
            )));
        }
    }

    let stream = &config.stream;
    if stream.topic.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "stream.topic cannot be empty".to_string(),
        ));
    }
    if stream.group_id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "stream.group_id cannot be empty".to_string(),
        ));
    }
    if stream.poll_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "stream.poll_timeout_ms cannot be 0".to_string(),
        ));
    }

    if stream.enabled && stream.backend == StreamBackend::Memory {
        return Err(ConfigError::ValidationError(
            "stream.enabled requires stream.backend = \"kafka\", the memory backend only serves in-process publishers".to_string(),
        ));
    }

    if stream.backend == StreamBackend::Kafka {
        match &stream.kafka {
            Some(kafka) if !kafka.bootstrap_servers.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::ValidationError(
                    "stream.kafka.bootstrap_servers is required for the kafka backend".to_string(),
                ))
            }
        }

        if stream.enabled && !cfg!(feature = "kafka") {
            return Err(ConfigError::ValidationError(
                "stream.backend = \"kafka\" requires building with the `kafka` feature"
                    .to_string(),
            ));
        }
    }

    Ok(())
}
