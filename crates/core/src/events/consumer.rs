//! Generic at-least-once stream processing loop.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::metrics;

use super::Message;

/// Error returned by message handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors of stream consumption.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Failed to subscribe to {topic}: {message}")]
    Subscribe { topic: String, message: String },

    #[error("Error reading message: {0}")]
    Transport(String),

    #[error("Error processing message: {0}")]
    Handler(HandlerError),

    #[error("Error committing offset: {0}")]
    Commit(String),

    #[error("Consumer is already processing")]
    AlreadyProcessing,

    #[error("Consumer is closed")]
    Closed,
}

/// Location of a message in a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// A message together with where it was read from.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub position: Position,
    pub message: Message,
}

/// A consumer group member of a message bus.
#[async_trait]
pub trait BusConsumer: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Subscribe to `topic`, replacing any current subscription.
    /// Reading resumes from the group's committed offsets.
    async fn subscribe(&self, topic: &str) -> Result<(), StreamError>;

    /// Wait up to `timeout` for the next message. `None` on timeout.
    async fn poll(&self, timeout: Duration) -> Result<Option<Delivery>, StreamError>;

    /// Commit `position` as the next offset the group should read.
    async fn commit(&self, position: &Position) -> Result<(), StreamError>;
}

/// Processes one message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

/// Lifecycle of a `StreamConsumer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConsumerState {
    Idle = 0,
    Subscribed = 1,
    Polling = 2,
    Delivering = 3,
    Closed = 4,
}

impl ConsumerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConsumerState::Idle,
            1 => ConsumerState::Subscribed,
            2 => ConsumerState::Polling,
            3 => ConsumerState::Delivering,
            _ => ConsumerState::Closed,
        }
    }
}

/// Runs handlers over the messages of a bus with at-least-once semantics.
pub struct StreamConsumer {
    bus: Arc<dyn BusConsumer>,
    poll_timeout: Duration,
    processing: AtomicBool,
    state: AtomicU8,
}

/// Clears the processing flag when `process` returns.
struct ProcessingGuard<'a> {
    consumer: &'a StreamConsumer,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.consumer.set_state(ConsumerState::Closed);
        self.consumer.processing.store(false, Ordering::SeqCst);
    }
}

impl StreamConsumer {
    pub fn new(bus: Arc<dyn BusConsumer>, poll_timeout: Duration) -> Self {
        Self {
            bus,
            poll_timeout,
            processing: AtomicBool::new(false),
            state: AtomicU8::new(ConsumerState::Idle as u8),
        }
    }

    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ConsumerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Subscribe to `topic` and hand every message to `handler` until
    /// `shutdown` turns true or an error occurs.
    ///
    /// The offset after a message is committed only once its handler
    /// succeeded. A handler error ends processing without committing, so the
    /// message is read again by the next subscription of the group.
    /// Returns `Ok(())` only on shutdown.
    pub async fn process<H>(
        &self,
        topic: &str,
        shutdown: &watch::Receiver<bool>,
        handler: &H,
    ) -> Result<(), StreamError>
    where
        H: MessageHandler + ?Sized,
    {
        if self.processing.swap(true, Ordering::SeqCst) {
            return Err(StreamError::AlreadyProcessing);
        }
        let _guard = ProcessingGuard { consumer: self };

        self.bus.subscribe(topic).await?;
        self.set_state(ConsumerState::Subscribed);
        info!(topic = %topic, bus = self.bus.name(), "Subscribed to topic");

        loop {
            if *shutdown.borrow() {
                info!(topic = %topic, "Stream consumer received shutdown signal");
                return Ok(());
            }

            self.set_state(ConsumerState::Polling);
            let Some(delivery) = self.bus.poll(self.poll_timeout).await? else {
                continue;
            };

            self.set_state(ConsumerState::Delivering);
            let position = &delivery.position;
            debug!(
                topic = %position.topic,
                partition = position.partition,
                offset = position.offset,
                "Delivering message"
            );

            if let Err(e) = handler.handle(&delivery.message).await {
                metrics::STREAM_MESSAGES.with_label_values(&["failed"]).inc();
                warn!(
                    topic = %position.topic,
                    partition = position.partition,
                    offset = position.offset,
                    error = %e,
                    "Message handler failed, offset not committed"
                );
                return Err(StreamError::Handler(e));
            }

            self.bus
                .commit(&Position {
                    topic: position.topic.clone(),
                    partition: position.partition,
                    offset: position.offset + 1,
                })
                .await?;
            metrics::STREAM_MESSAGES.with_label_values(&["committed"]).inc();
        }
    }
}
