//! Jira REST v2 ticket client implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::metrics;
use crate::ticket::{Ticket, Transition};

use super::{TicketClient, TicketClientError, TrackerServerConfig};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const SEARCH_MAX_RESULTS: &str = "50";

/// Jira client.
pub struct JiraClient {
    client: Client,
    base_url: String,
    user: Option<String>,
    token: String,
}

impl JiraClient {
    /// Create a new Jira client for a tracker server.
    pub fn new(server: &TrackerServerConfig) -> Result<Self, TicketClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TicketClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: server.url.trim_end_matches('/').to_string(),
            user: server.user.clone(),
            token: server.token.clone(),
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/rest/api/2{}", self.base_url, endpoint)
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    /// Basic auth when a user is configured, bearer token (PAT) otherwise.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.user {
            Some(user) => request.basic_auth(user, Some(&self.token)),
            None => request.bearer_auth(&self.token),
        }
    }

    /// Send a request, recording metrics, and fail on non-success statuses.
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, TicketClientError> {
        let start = Instant::now();
        let result = self.execute(request).await;
        metrics::TRACKER_REQUEST_DURATION
            .with_label_values(&["jira", operation])
            .observe(start.elapsed().as_secs_f64());

        let label = match &result {
            Ok(_) => "success",
            Err(TicketClientError::Api { status, .. })
                if *status == StatusCode::NOT_FOUND.as_u16() =>
            {
                "not_found"
            }
            Err(e) => e.kind(),
        };
        metrics::TRACKER_REQUESTS
            .with_label_values(&["jira", operation, label])
            .inc();

        result
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, TicketClientError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                TicketClientError::Timeout
            } else {
                TicketClientError::ConnectionFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TicketClientError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn parse<T: for<'de> Deserialize<'de>>(
        response: Response,
    ) -> Result<T, TicketClientError> {
        response
            .json()
            .await
            .map_err(|e| TicketClientError::InvalidResponse(e.to_string()))
    }

    fn to_ticket(&self, issue: JiraIssue) -> Ticket {
        let fields = issue.fields;
        Ticket {
            url_tracker: self.browse_url(&issue.key),
            id: issue.id,
            key: issue.key,
            team_id: String::new(),
            finding_id: String::new(),
            summary: fields.summary,
            description: fields.description.unwrap_or_default(),
            project: fields.project.map(|p| p.key).unwrap_or_default(),
            status: fields.status.map(|s| s.name).unwrap_or_default(),
            ticket_type: fields.issue_type.map(|t| t.name).unwrap_or_default(),
            resolution: fields.resolution.map(|r| r.name),
            labels: fields.labels,
        }
    }
}

#[async_trait]
impl TicketClient for JiraClient {
    fn name(&self) -> &str {
        "jira"
    }

    async fn get(&self, id: &str) -> Result<Ticket, TicketClientError> {
        let request = self.client.get(self.api_url(&format!("/issue/{id}")));
        let response = self.send("get", request).await.map_err(|e| match e {
            TicketClientError::Api { status: 404, .. } => TicketClientError::NotFound(id.to_string()),
            other => other,
        })?;

        let issue: JiraIssue = Self::parse(response).await?;
        Ok(self.to_ticket(issue))
    }

    async fn find(
        &self,
        project: &str,
        issue_type: &str,
        text: &str,
    ) -> Result<Option<Ticket>, TicketClientError> {
        let jql = build_search_jql(project, issue_type, text);
        debug!(jql = %jql, "Searching Jira issues");

        let request = self
            .client
            .get(self.api_url("/search"))
            .query(&[("jql", jql.as_str()), ("maxResults", SEARCH_MAX_RESULTS)]);
        let response = self.send("search", request).await?;
        let result: JiraSearchResult = Self::parse(response).await?;

        // Jira text search is fuzzy; keep only exact substring matches.
        Ok(result
            .issues
            .into_iter()
            .find(|issue| {
                issue
                    .fields
                    .description
                    .as_deref()
                    .is_some_and(|d| d.contains(text))
            })
            .map(|issue| self.to_ticket(issue)))
    }

    async fn create(&self, ticket: &Ticket) -> Result<Ticket, TicketClientError> {
        let body = json!({
            "fields": {
                "project": { "key": ticket.project },
                "summary": ticket.summary,
                "description": ticket.description,
                "issuetype": { "name": ticket.ticket_type },
                "labels": ticket.labels,
            }
        });

        let request = self.client.post(self.api_url("/issue")).json(&body);
        let response = self.send("create", request).await?;
        let created: JiraCreatedIssue = Self::parse(response).await?;
        debug!(id = %created.id, key = %created.key, "Created Jira issue");

        self.get(&created.id).await
    }

    async fn list_transitions(&self, id: &str) -> Result<Vec<Transition>, TicketClientError> {
        let request = self
            .client
            .get(self.api_url(&format!("/issue/{id}/transitions")));
        let response = self.send("list_transitions", request).await?;
        let result: JiraTransitions = Self::parse(response).await?;

        Ok(result
            .transitions
            .into_iter()
            .map(|t| Transition::new(t.id, t.to.name))
            .collect())
    }

    async fn do_transition(&self, id: &str, transition_id: &str) -> Result<(), TicketClientError> {
        let body = json!({ "transition": { "id": transition_id } });
        let request = self
            .client
            .post(self.api_url(&format!("/issue/{id}/transitions")))
            .json(&body);
        self.send("do_transition", request).await?;
        Ok(())
    }

    async fn do_transition_with_resolution(
        &self,
        id: &str,
        transition_id: &str,
        resolution: &str,
    ) -> Result<(), TicketClientError> {
        let body = json!({
            "transition": { "id": transition_id },
            "fields": { "resolution": { "name": resolution } },
        });
        let request = self
            .client
            .post(self.api_url(&format!("/issue/{id}/transitions")))
            .json(&body);
        self.send("do_transition", request).await?;
        Ok(())
    }
}

/// JQL selecting issues of a project and type whose description contains a phrase.
pub(crate) fn build_search_jql(project: &str, issue_type: &str, text: &str) -> String {
    format!(
        "project = \"{}\" AND issuetype = \"{}\" AND description ~ \"\\\"{}\\\"\"",
        escape_jql(project),
        escape_jql(issue_type),
        escape_jql(text)
    )
}

fn escape_jql(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// Jira API response types

#[derive(Debug, Deserialize)]
struct JiraIssue {
    id: String,
    key: String,
    #[serde(default)]
    fields: JiraFields,
}

#[derive(Debug, Default, Deserialize)]
struct JiraFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    project: Option<JiraProject>,
    #[serde(default)]
    status: Option<JiraNamed>,
    #[serde(default, rename = "issuetype")]
    issue_type: Option<JiraNamed>,
    #[serde(default)]
    resolution: Option<JiraNamed>,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JiraProject {
    key: String,
}

#[derive(Debug, Deserialize)]
struct JiraNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct JiraSearchResult {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct JiraCreatedIssue {
    id: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct JiraTransitions {
    #[serde(default)]
    transitions: Vec<JiraTransition>,
}

#[derive(Debug, Deserialize)]
struct JiraTransition {
    id: String,
    to: JiraNamed,
}
