//! Tracker server credentials.
//!
//! Credentials come either inline from the configuration file or from a
//! directory of JSON secrets, and are cached for a configurable time.

mod cache;
mod file;
mod types;

pub use cache::CachedCredentialProvider;
pub use file::FileCredentialProvider;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, CredentialsBackend};

/// Build the credential provider selected by `[credentials]`.
pub fn build_credential_provider(config: &Config) -> Arc<dyn CredentialProvider> {
    let inner: Arc<dyn CredentialProvider> = match config.credentials.backend {
        CredentialsBackend::Config => Arc::new(ConfigCredentialProvider::from_config(config)),
        CredentialsBackend::File => Arc::new(FileCredentialProvider::new(
            config.credentials.dir.clone(),
            config.credentials.prefix.clone(),
        )),
    };

    match config.credentials.cache_ttl_secs {
        0 => inner,
        ttl => Arc::new(CachedCredentialProvider::new(inner, Duration::from_secs(ttl))),
    }
}
