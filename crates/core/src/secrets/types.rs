use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

/// Errors resolving tracker credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credentials for server: {0}")]
    NotFound(String),

    #[error("Invalid server ID for secret lookup: {0}")]
    InvalidServerId(String),

    #[error("Failed to read secret {path}: {message}")]
    Read { path: String, message: String },

    #[error("Malformed secret for server {server_id}: {message}")]
    Malformed { server_id: String, message: String },
}

/// Credentials of a tracker server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub user: Option<String>,
    pub token: String,
}

/// Source of tracker server credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn server_credentials(&self, server_id: &str) -> Result<Credentials, CredentialError>;
}

/// Credentials written inline in `[servers.<id>]`.
#[derive(Debug, Clone, Default)]
pub struct ConfigCredentialProvider {
    credentials: HashMap<String, Credentials>,
}

impl ConfigCredentialProvider {
    pub fn from_config(config: &Config) -> Self {
        let credentials = config
            .servers
            .iter()
            .filter_map(|(id, server)| {
                server.token.as_ref().map(|token| {
                    (
                        id.clone(),
                        Credentials {
                            user: server.user.clone(),
                            token: token.clone(),
                        },
                    )
                })
            })
            .collect();

        Self { credentials }
    }
}

#[async_trait]
impl CredentialProvider for ConfigCredentialProvider {
    fn name(&self) -> &str {
        "config"
    }

    async fn server_credentials(&self, server_id: &str) -> Result<Credentials, CredentialError> {
        self.credentials
            .get(server_id)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(server_id.to_string()))
    }
}
