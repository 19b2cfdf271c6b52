//! Client of the finding entity stream.
//!
//! Every message carries a `version` header with the semantic version of the
//! payload format; only major version 0 is understood. The key is the
//! finding ID and the value the JSON `FindingNotification`, or nothing for a
//! tombstone.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use crate::metrics;
use crate::tracking::TrackingError;

use super::{FindingNotification, HandlerError, Message, MessageHandler, StreamConsumer, StreamError};

/// Topic of the finding entity.
pub const FINDINGS_ENTITY: &str = "findings-v0";

/// Major payload version understood by this client.
pub const MAJOR_VERSION: u64 = 0;

/// Header holding the payload version.
pub const VERSION_HEADER: &str = "version";

/// Errors of finding stream processing.
#[derive(Debug, Error)]
pub enum FindingStreamError {
    #[error("Invalid metadata: missing version entry")]
    MissingVersion,

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("Could not decode finding with ID {finding_id:?}: {message}")]
    Decode { finding_id: String, message: String },

    #[error("Failed to reconcile finding {finding_id} for team {team_id}: {source}")]
    Reconcile {
        finding_id: String,
        team_id: String,
        #[source]
        source: TrackingError,
    },

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Handles decoded findings.
#[async_trait]
pub trait FindingHandler: Send + Sync {
    /// `finding` is `None` for tombstones.
    async fn handle_finding(
        &self,
        finding_id: &str,
        finding: Option<&FindingNotification>,
    ) -> Result<(), FindingStreamError>;
}

/// Whether a semantic version string is compatible with this client.
///
/// Accepts an optional `v` prefix and requires at least three components.
pub fn supported_version(version: &str) -> bool {
    let version = version.strip_prefix('v').unwrap_or(version);
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 3 {
        return false;
    }

    parts[0]
        .parse::<u64>()
        .is_ok_and(|major| major == MAJOR_VERSION)
}

/// Validate the metadata of a message and decode its payload.
pub(crate) fn decode(message: &Message) -> Result<Option<FindingNotification>, FindingStreamError> {
    let version = message
        .header(VERSION_HEADER)
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .filter(|v| !v.is_empty())
        .ok_or(FindingStreamError::MissingVersion)?;

    if !supported_version(&version) {
        return Err(FindingStreamError::UnsupportedVersion(version));
    }

    let Some(value) = message.value.as_deref() else {
        return Ok(None);
    };

    serde_json::from_slice(value)
        .map(Some)
        .map_err(|e| FindingStreamError::Decode {
            finding_id: message.key_str(),
            message: e.to_string(),
        })
}

/// Adapts a `FindingHandler` to raw stream messages.
struct FindingMessageHandler<'a, H: ?Sized> {
    handler: &'a H,
}

#[async_trait]
impl<'a, H> MessageHandler for FindingMessageHandler<'a, H>
where
    H: FindingHandler + ?Sized,
{
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let finding = match decode(message) {
            Ok(finding) => finding,
            Err(e) => {
                metrics::STREAM_MESSAGES.with_label_values(&["rejected"]).inc();
                warn!(finding_id = %message.key_str(), error = %e, "Rejected finding message");
                return Err(Box::new(e));
            }
        };

        let finding_id = message.key_str();
        if finding.is_none() {
            metrics::STREAM_MESSAGES.with_label_values(&["tombstone"]).inc();
        }

        self.handler
            .handle_finding(&finding_id, finding.as_ref())
            .await
            .map_err(|e| Box::new(e) as HandlerError)
    }
}

/// Reads findings from the finding entity topic.
pub struct FindingsStream {
    consumer: StreamConsumer,
    topic: String,
}

impl FindingsStream {
    pub fn new(consumer: StreamConsumer) -> Self {
        Self::with_topic(consumer, FINDINGS_ENTITY)
    }

    pub fn with_topic(consumer: StreamConsumer, topic: impl Into<String>) -> Self {
        Self {
            consumer,
            topic: topic.into(),
        }
    }

    /// Process findings with `handler` until `shutdown` turns true or an
    /// error occurs. Messages with a missing or unsupported version are
    /// rejected before the handler sees them.
    pub async fn process_findings<H>(
        &self,
        shutdown: &watch::Receiver<bool>,
        handler: &H,
    ) -> Result<(), FindingStreamError>
    where
        H: FindingHandler + ?Sized,
    {
        let adapter = FindingMessageHandler { handler };

        match self.consumer.process(&self.topic, shutdown, &adapter).await {
            Ok(()) => Ok(()),
            Err(StreamError::Handler(e)) => match e.downcast::<FindingStreamError>() {
                Ok(inner) => Err(*inner),
                Err(other) => Err(StreamError::Handler(other).into()),
            },
            Err(e) => Err(e.into()),
        }
    }
}
