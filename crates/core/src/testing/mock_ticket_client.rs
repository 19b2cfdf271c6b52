//! Mock ticket tracker for testing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::ticket::{Ticket, Transition};
use crate::tracker_client::{
    TicketClient, TicketClientError, TicketClientFactory, TrackerServerConfig,
};

/// Base of the browser URLs stamped on mock tickets.
pub const MOCK_TRACKER_URL: &str = "https://tracker.mock";

/// Status of freshly created tickets.
pub const MOCK_INITIAL_STATUS: &str = "To Do";

/// A recorded tracker call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Get {
        id: String,
    },
    Find {
        project: String,
        issue_type: String,
        text: String,
    },
    Create(Ticket),
    ListTransitions {
        id: String,
    },
    /// `to` is empty when the transition was not available.
    DoTransition {
        id: String,
        transition_id: String,
        to: String,
        resolution: Option<String>,
    },
}

/// Tracker operations, for counting calls and injecting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Get,
    Find,
    Create,
    ListTransitions,
    DoTransition,
}

impl MockCall {
    pub fn operation(&self) -> MockOperation {
        match self {
            MockCall::Get { .. } => MockOperation::Get,
            MockCall::Find { .. } => MockOperation::Find,
            MockCall::Create(_) => MockOperation::Create,
            MockCall::ListTransitions { .. } => MockOperation::ListTransitions,
            MockCall::DoTransition { .. } => MockOperation::DoTransition,
        }
    }
}

/// Mock implementation of the TicketClient trait.
///
/// Keeps tickets in memory and moves them along a configurable transition
/// graph:
/// - Record every call for assertions
/// - Search descriptions like a tracker's text search
/// - Simulate failures, once or for every call of an operation
///
/// # Example
///
/// ```rust,ignore
/// let client = Arc::new(MockTicketClient::new());
/// client.set_linear_workflow(&["To Do", "In Progress", "Resolved"]).await;
///
/// let ticket = client.insert_ticket(Ticket { project: "SEC".into(), ..Default::default() }).await;
/// let engine = WorkflowEngine::new(client.clone());
/// engine.advance_to_fixed(&ticket.key, &workflow).await?;
///
/// assert_eq!(client.count_calls(MockOperation::DoTransition).await, 2);
/// ```
#[derive(Debug, Default)]
pub struct MockTicketClient {
    /// Stored tickets, in creation order.
    tickets: Arc<RwLock<Vec<Ticket>>>,
    /// Available transitions by current status.
    transitions: Arc<RwLock<HashMap<String, Vec<Transition>>>>,
    /// Recorded calls.
    calls: Arc<RwLock<Vec<MockCall>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TicketClientError>>>,
    /// Operations that always fail.
    failing: Arc<RwLock<HashSet<MockOperation>>>,
    /// Counter for generating ticket ids.
    counter: Arc<RwLock<u32>>,
}

impl MockTicketClient {
    /// Create a new mock tracker with no tickets and no transitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow moving from each status to the next one in `statuses`.
    pub async fn set_linear_workflow(&self, statuses: &[&str]) {
        for (i, pair) in statuses.windows(2).enumerate() {
            self.set_transition(pair[0], &format!("{}", (i + 1) * 10 + 1), pair[1])
                .await;
        }
    }

    /// Allow moving from status `from` to status `to` through transition `id`.
    pub async fn set_transition(&self, from: &str, id: &str, to: &str) {
        let mut transitions = self.transitions.write().await;
        let available = transitions.entry(from.to_string()).or_default();
        available.retain(|t| t.to_name != to);
        available.push(Transition::new(id, to));
    }

    /// Store a ticket without recording a call.
    ///
    /// Key and id are assigned when empty; the status defaults to the
    /// initial one.
    pub async fn insert_ticket(&self, mut ticket: Ticket) -> Ticket {
        self.assign_identity(&mut ticket).await;
        if ticket.status.is_empty() {
            ticket.status = MOCK_INITIAL_STATUS.to_string();
        }
        self.tickets.write().await.push(ticket.clone());
        ticket
    }

    /// Stored ticket by id or key.
    pub async fn ticket(&self, id: &str) -> Option<Ticket> {
        self.tickets
            .read()
            .await
            .iter()
            .find(|t| t.id == id || t.key == id)
            .cloned()
    }

    /// Delete a ticket, as if someone removed it from the tracker.
    pub async fn remove_ticket(&self, id: &str) {
        self.tickets
            .write()
            .await
            .retain(|t| t.id != id && t.key != id);
    }

    /// Number of stored tickets.
    pub async fn ticket_count(&self) -> usize {
        self.tickets.read().await.len()
    }

    /// All recorded calls.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.read().await.clone()
    }

    /// Number of recorded calls of an operation.
    pub async fn count_calls(&self, operation: MockOperation) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Clear recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TicketClientError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every call of `operation` fail.
    pub async fn fail_always(&self, operation: MockOperation) {
        self.failing.write().await.insert(operation);
    }

    /// Stop injecting failures.
    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
        *self.next_error.write().await = None;
    }

    async fn assign_identity(&self, ticket: &mut Ticket) {
        if !ticket.id.is_empty() && !ticket.key.is_empty() {
            return;
        }

        let mut counter = self.counter.write().await;
        *counter += 1;
        if ticket.id.is_empty() {
            ticket.id = format!("{}", 10_000 + *counter);
        }
        if ticket.key.is_empty() {
            let project = if ticket.project.is_empty() {
                "MOCK"
            } else {
                ticket.project.as_str()
            };
            ticket.key = format!("{}-{}", project, *counter);
        }
        ticket.url_tracker = format!("{}/browse/{}", MOCK_TRACKER_URL, ticket.key);
    }

    /// Record a call, then fail it if a failure is configured.
    async fn record(&self, call: MockCall) -> Result<(), TicketClientError> {
        let operation = call.operation();
        self.calls.write().await.push(call);

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if self.failing.read().await.contains(&operation) {
            return Err(TicketClientError::Api {
                status: 500,
                body: format!("mock failure of {operation:?}"),
            });
        }
        Ok(())
    }

    async fn available_transition(&self, id: &str, transition_id: &str) -> Option<Transition> {
        let status = self.ticket(id).await?.status;
        self.transitions
            .read()
            .await
            .get(&status)?
            .iter()
            .find(|t| t.id == transition_id)
            .cloned()
    }

    async fn transition(
        &self,
        id: &str,
        transition_id: &str,
        resolution: Option<&str>,
    ) -> Result<(), TicketClientError> {
        let transition = self.available_transition(id, transition_id).await;
        self.record(MockCall::DoTransition {
            id: id.to_string(),
            transition_id: transition_id.to_string(),
            to: transition
                .as_ref()
                .map(|t| t.to_name.clone())
                .unwrap_or_default(),
            resolution: resolution.map(str::to_string),
        })
        .await?;

        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .iter_mut()
            .find(|t| t.id == id || t.key == id)
            .ok_or_else(|| TicketClientError::NotFound(id.to_string()))?;
        let transition = transition.ok_or_else(|| TicketClientError::Api {
            status: 400,
            body: format!("transition {transition_id} is not valid for {id}"),
        })?;

        ticket.status = transition.to_name;
        if let Some(resolution) = resolution {
            ticket.resolution = Some(resolution.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl TicketClient for MockTicketClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get(&self, id: &str) -> Result<Ticket, TicketClientError> {
        self.record(MockCall::Get { id: id.to_string() }).await?;
        self.ticket(id)
            .await
            .ok_or_else(|| TicketClientError::NotFound(id.to_string()))
    }

    async fn find(
        &self,
        project: &str,
        issue_type: &str,
        text: &str,
    ) -> Result<Option<Ticket>, TicketClientError> {
        self.record(MockCall::Find {
            project: project.to_string(),
            issue_type: issue_type.to_string(),
            text: text.to_string(),
        })
        .await?;

        Ok(self
            .tickets
            .read()
            .await
            .iter()
            .find(|t| {
                t.project == project && t.ticket_type == issue_type && t.description.contains(text)
            })
            .cloned())
    }

    async fn create(&self, ticket: &Ticket) -> Result<Ticket, TicketClientError> {
        self.record(MockCall::Create(ticket.clone())).await?;

        // Trackers only store the ticket fields.
        let mut created = Ticket {
            summary: ticket.summary.clone(),
            description: ticket.description.clone(),
            project: ticket.project.clone(),
            ticket_type: ticket.ticket_type.clone(),
            labels: ticket.labels.clone(),
            status: MOCK_INITIAL_STATUS.to_string(),
            ..Default::default()
        };
        self.assign_identity(&mut created).await;
        self.tickets.write().await.push(created.clone());
        Ok(created)
    }

    async fn list_transitions(&self, id: &str) -> Result<Vec<Transition>, TicketClientError> {
        self.record(MockCall::ListTransitions { id: id.to_string() })
            .await?;

        let status = self
            .ticket(id)
            .await
            .ok_or_else(|| TicketClientError::NotFound(id.to_string()))?
            .status;
        Ok(self
            .transitions
            .read()
            .await
            .get(&status)
            .cloned()
            .unwrap_or_default())
    }

    async fn do_transition(&self, id: &str, transition_id: &str) -> Result<(), TicketClientError> {
        self.transition(id, transition_id, None).await
    }

    async fn do_transition_with_resolution(
        &self,
        id: &str,
        transition_id: &str,
        resolution: &str,
    ) -> Result<(), TicketClientError> {
        self.transition(id, transition_id, Some(resolution)).await
    }
}

/// Factory handing out one shared `MockTicketClient` for every server.
#[derive(Debug)]
pub struct MockTicketClientFactory {
    client: Arc<MockTicketClient>,
    built: Mutex<Vec<TrackerServerConfig>>,
}

impl MockTicketClientFactory {
    pub fn new(client: Arc<MockTicketClient>) -> Self {
        Self {
            client,
            built: Mutex::new(Vec::new()),
        }
    }

    /// The client returned by every build.
    pub fn client(&self) -> Arc<MockTicketClient> {
        self.client.clone()
    }

    /// Server settings of every build, in order.
    pub async fn built_servers(&self) -> Vec<TrackerServerConfig> {
        self.built
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TicketClientFactory for MockTicketClientFactory {
    fn build(
        &self,
        server: &TrackerServerConfig,
    ) -> Result<Arc<dyn TicketClient>, TicketClientError> {
        self.built
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(server.clone());
        Ok(self.client.clone())
    }
}
