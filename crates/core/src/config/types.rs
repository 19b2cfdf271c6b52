use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Ticket tracker servers keyed by server ID.
    #[serde(default)]
    pub servers: BTreeMap<String, TrackerServerEntry>,
    /// Team projects keyed by project ID.
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectEntry>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Logging configuration.
///
/// `RUST_LOG` takes precedence over `level` when set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("vulntrack.db")
}

/// Finding stream consumer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Enable/disable the finding consumer.
    /// When disabled, tickets are only managed through the REST API.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub backend: StreamBackend,
    /// Topic carrying finding notifications.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Consumer group used for offset commits.
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Bounded poll timeout; the consumer checks for cancellation between polls.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
    /// Delay before restarting a failed subscribe+process cycle.
    /// Zero disables retrying: the first error is fatal.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: StreamBackend::default(),
            topic: default_topic(),
            group_id: default_group_id(),
            poll_timeout_ms: default_poll_timeout(),
            retry_delay_secs: default_retry_delay(),
            kafka: None,
        }
    }
}

fn default_topic() -> String {
    crate::events::FINDINGS_ENTITY.to_string()
}

fn default_group_id() -> String {
    "vulntrack".to_string()
}

fn default_poll_timeout() -> u64 {
    100
}

fn default_retry_delay() -> u64 {
    5
}

/// Available message bus backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamBackend {
    /// In-process partitioned log (local runs and tests).
    #[default]
    Memory,
    /// Kafka, requires the `kafka` cargo feature.
    Kafka,
}

/// Kafka consumer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    /// Comma separated list of brokers (e.g., "localhost:9092")
    pub bootstrap_servers: String,
    /// Extra librdkafka properties passed through verbatim.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Where tracker credentials come from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub backend: CredentialsBackend,
    /// Root directory of the file secret store.
    #[serde(default = "default_secrets_dir")]
    pub dir: PathBuf,
    /// Prefix joined with the server ID to build the secret path.
    #[serde(default = "default_secrets_prefix")]
    pub prefix: String,
    /// How long resolved credentials stay cached (0 = no caching).
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: CredentialsBackend::default(),
            dir: default_secrets_dir(),
            prefix: default_secrets_prefix(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_secrets_dir() -> PathBuf {
    PathBuf::from("secrets")
}

fn default_secrets_prefix() -> String {
    "trackers".to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsBackend {
    /// Credentials inline in `[servers.<id>]`.
    #[default]
    Config,
    /// One JSON secret per server under `dir/prefix/<server_id>`.
    File,
}

/// Kind of ticket tracker behind a server entry
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    #[default]
    Jira,
}

impl TrackerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerKind::Jira => "jira",
        }
    }
}

/// A ticket tracker server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerServerEntry {
    pub name: String,
    /// Base URL (e.g., "https://jira.example.com")
    pub url: String,
    #[serde(default)]
    pub kind: TrackerKind,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Routing and workflow configuration of a team
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectEntry {
    pub name: String,
    pub team_id: String,
    pub server_id: String,
    /// Tracker project key (e.g., "SEC")
    pub project: String,
    pub vulnerability_issue_type: String,
    #[serde(default)]
    pub fix_workflow: Vec<String>,
    #[serde(default)]
    pub wont_fix_workflow: Vec<String>,
    /// Create and advance tickets automatically from finding events.
    #[serde(default)]
    pub auto_create: bool,
}

/// Sanitized config for API responses and startup logs (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub database: DatabaseConfig,
    pub stream: SanitizedStreamConfig,
    pub credentials: CredentialsConfig,
    pub servers: BTreeMap<String, SanitizedTrackerServer>,
    pub projects: BTreeMap<String, ProjectEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStreamConfig {
    pub enabled: bool,
    pub backend: StreamBackend,
    pub topic: String,
    pub group_id: String,
    pub poll_timeout_ms: u64,
    pub retry_delay_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_servers: Option<String>,
}

/// Tracker server with its token hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTrackerServer {
    pub name: String,
    pub url: String,
    pub kind: TrackerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub token_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            log: config.log.clone(),
            database: config.database.clone(),
            stream: SanitizedStreamConfig {
                enabled: config.stream.enabled,
                backend: config.stream.backend,
                topic: config.stream.topic.clone(),
                group_id: config.stream.group_id.clone(),
                poll_timeout_ms: config.stream.poll_timeout_ms,
                retry_delay_secs: config.stream.retry_delay_secs,
                bootstrap_servers: config
                    .stream
                    .kafka
                    .as_ref()
                    .map(|k| k.bootstrap_servers.clone()),
            },
            credentials: config.credentials.clone(),
            servers: config
                .servers
                .iter()
                .map(|(id, s)| {
                    (
                        id.clone(),
                        SanitizedTrackerServer {
                            name: s.name.clone(),
                            url: s.url.clone(),
                            kind: s.kind,
                            user: s.user.clone(),
                            token_configured: s.token.as_deref().is_some_and(|t| !t.is_empty()),
                        },
                    )
                })
                .collect(),
            projects: config.projects.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.database.path.to_str().unwrap(), "vulntrack.db");
        assert!(!config.stream.enabled);
        assert_eq!(config.stream.backend, StreamBackend::Memory);
        assert_eq!(config.stream.topic, "findings-v0");
        assert_eq!(config.stream.poll_timeout_ms, 100);
        assert_eq!(config.stream.retry_delay_secs, 5);
        assert_eq!(config.credentials.backend, CredentialsBackend::Config);
        assert!(config.servers.is_empty());
        assert!(config.projects.is_empty());
    }

    #[test]
    fn test_deserialize_servers_and_projects() {
        let toml = r#"
[servers.jira-main]
name = "Main Jira"
url = "https://jira.example.com"
user = "bot"
token = "secret"

[projects.sec]
name = "Security"
team_id = "6b2a5a30-8fb3-4b52-9a53-0e0ab7bfc1e2"
server_id = "jira-main"
project = "SEC"
vulnerability_issue_type = "Vulnerability"
fix_workflow = ["To Do", "In Progress", "Resolved"]
wont_fix_workflow = ["Resolved"]
auto_create = true
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let server = &config.servers["jira-main"];
        assert_eq!(server.kind, TrackerKind::Jira);
        assert_eq!(server.token.as_deref(), Some("secret"));

        let project = &config.projects["sec"];
        assert_eq!(project.project, "SEC");
        assert_eq!(project.fix_workflow.len(), 3);
        assert_eq!(project.wont_fix_workflow, vec!["Resolved".to_string()]);
        assert!(project.auto_create);
    }

    #[test]
    fn test_deserialize_kafka_stream() {
        let toml = r#"
[stream]
enabled = true
backend = "kafka"
group_id = "tracker"
retry_delay_secs = 0

[stream.kafka]
bootstrap_servers = "localhost:9092"

[stream.kafka.properties]
"security.protocol" = "plaintext"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.stream.enabled);
        assert_eq!(config.stream.backend, StreamBackend::Kafka);
        assert_eq!(config.stream.retry_delay_secs, 0);
        let kafka = config.stream.kafka.as_ref().unwrap();
        assert_eq!(kafka.bootstrap_servers, "localhost:9092");
        assert_eq!(kafka.properties["security.protocol"], "plaintext");
    }

    #[test]
    fn test_sanitized_config_hides_tokens() {
        let mut config = Config::default();
        config.servers.insert(
            "jira".to_string(),
            TrackerServerEntry {
                name: "Jira".to_string(),
                url: "https://jira.example.com".to_string(),
                kind: TrackerKind::Jira,
                user: Some("bot".to_string()),
                token: Some("super-secret".to_string()),
            },
        );

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.servers["jira"].token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
