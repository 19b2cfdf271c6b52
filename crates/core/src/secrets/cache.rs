use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CredentialError, CredentialProvider, Credentials};

/// Caches resolved credentials, refreshing them after `ttl`.
///
/// Failures are not cached.
pub struct CachedCredentialProvider {
    inner: Arc<dyn CredentialProvider>,
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, Credentials)>>,
}

impl CachedCredentialProvider {
    pub fn new(inner: Arc<dyn CredentialProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CredentialProvider for CachedCredentialProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn server_credentials(&self, server_id: &str) -> Result<Credentials, CredentialError> {
        if let Some((fetched_at, credentials)) = self.entries.read().await.get(server_id) {
            if fetched_at.elapsed() < self.ttl {
                return Ok(credentials.clone());
            }
        }

        let credentials = self.inner.server_credentials(server_id).await?;
        self.entries
            .write()
            .await
            .insert(server_id.to_string(), (Instant::now(), credentials.clone()));
        Ok(credentials)
    }
}
