use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{CredentialError, CredentialProvider, Credentials};

/// Secrets stored as one JSON document per server at `<dir>/<prefix>/<server_id>`.
///
/// The document holds `{"token": "...", "user": "..."}`, `user` optional.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    dir: PathBuf,
    prefix: String,
}

impl FileCredentialProvider {
    pub fn new(dir: PathBuf, prefix: String) -> Self {
        Self { dir, prefix }
    }

    fn secret_path(&self, server_id: &str) -> Result<PathBuf, CredentialError> {
        let mut components = Path::new(server_id).components();
        let valid = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !valid {
            return Err(CredentialError::InvalidServerId(server_id.to_string()));
        }

        Ok(self.dir.join(&self.prefix).join(server_id))
    }
}

#[async_trait]
impl CredentialProvider for FileCredentialProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn server_credentials(&self, server_id: &str) -> Result<Credentials, CredentialError> {
        let path = self.secret_path(server_id)?;
        debug!(path = %path.display(), "Reading server credentials");

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::NotFound(server_id.to_string()));
            }
            Err(e) => {
                return Err(CredentialError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_str(&contents).map_err(|e| CredentialError::Malformed {
            server_id: server_id.to_string(),
            message: e.to_string(),
        })
    }
}
