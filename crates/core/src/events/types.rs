//! Transport-neutral messages and the finding notification payload.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Finding status of a fixed vulnerability.
pub const STATUS_FIXED: &str = "FIXED";
/// Finding status of a discarded vulnerability.
pub const STATUS_FALSE_POSITIVE: &str = "FALSE POSITIVE";

/// A message read from a stream.
///
/// A `None` value is a tombstone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<MetadataEntry>,
}

/// A message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Message {
    pub fn new(key: Option<impl Into<Vec<u8>>>, value: Option<impl Into<Vec<u8>>>) -> Self {
        Self {
            key: key.map(Into::into),
            value: value.map(Into::into),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push(MetadataEntry {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Value of the last header named `key`.
    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.key == key.as_bytes())
            .map(|h| h.value.as_slice())
    }

    /// Message key as text, empty when absent.
    pub fn key_str(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }
}

/// Notification of a finding state change, with issue, target and source
/// expanded. Unknown fields are ignored and missing ones defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindingNotification {
    pub id: String,
    pub affected_resource: String,
    #[serde(deserialize_with = "null_as_default")]
    pub score: f32,
    pub status: String,
    pub details: String,
    pub impact_details: String,
    pub issue: Issue,
    pub target: Target,
    pub source: Source,
    #[serde(deserialize_with = "null_as_default")]
    pub resources: Vec<ResourceGroup>,
    /// Hours the finding has been open over its lifetime.
    #[serde(deserialize_with = "null_as_default")]
    pub total_exposure: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub current_exposure: i64,
}

/// A vulnerability, with its labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
    pub id: String,
    pub summary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cwe_id: u32,
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub reference_links: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
}

/// The scanned asset and the teams owning it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub id: String,
    pub identifier: String,
    #[serde(deserialize_with = "null_as_default")]
    pub teams: Vec<String>,
}

/// The check that reported the finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    pub id: String,
    pub instance: String,
    pub options: String,
    pub time: Option<DateTime<Utc>>,
    pub name: String,
    pub component: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceGroup {
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub attributes: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub resources: Vec<BTreeMap<String, String>>,
}

impl FindingNotification {
    /// Ticket description built from the issue and finding details.
    pub fn ticket_description(&self) -> String {
        let mut sections = Vec::new();

        if !self.issue.description.is_empty() {
            sections.push(self.issue.description.clone());
        }
        if !self.affected_resource.is_empty() {
            sections.push(format!("Affected resource: {}", self.affected_resource));
        }
        if !self.details.is_empty() {
            sections.push(format!("Details:\n{}", self.details));
        }
        if !self.issue.recommendations.is_empty() {
            sections.push(format!(
                "Recommendations:\n{}",
                bullet_list(&self.issue.recommendations)
            ));
        }
        if !self.issue.reference_links.is_empty() {
            sections.push(format!(
                "References:\n{}",
                bullet_list(&self.issue.reference_links)
            ));
        }

        sections.join("\n\n")
    }
}

/// Read `null` as the type's default; Go producers encode nil slices as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
