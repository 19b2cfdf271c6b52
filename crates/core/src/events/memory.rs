//! In-process partitioned message log.
//!
//! Topics are append-only partitions; consumer groups keep committed offsets
//! the way a Kafka cluster does, which makes redelivery after a failed
//! message observable in tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{BusConsumer, Delivery, Message, Position, StreamError};

#[derive(Default)]
struct BrokerState {
    /// Partitions of each topic.
    topics: HashMap<String, Vec<Vec<Message>>>,
    /// Committed offsets by (group, topic, partition).
    committed: HashMap<(String, String, i32), i64>,
}

/// Shared in-memory broker. Clones refer to the same log.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    published: Arc<Notify>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BrokerState>, StreamError> {
        self.state
            .lock()
            .map_err(|_| StreamError::Transport("memory broker state poisoned".to_string()))
    }

    /// Create `topic` with `partitions` partitions if it does not exist.
    #[cfg(test)]
    fn create_topic(&self, topic: &str, partitions: usize) {
        if let Ok(mut state) = self.lock() {
            state
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new(); partitions.max(1)]);
        }
    }

    /// Append a message and return its position.
    ///
    /// Unknown topics are created with a single partition. Messages with the
    /// same key always land in the same partition.
    pub fn publish(&self, topic: &str, message: Message) -> Option<Position> {
        let position = {
            let mut state = self.lock().ok()?;
            let partitions = state
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new()]);

            let partition = partition_for(message.key.as_deref(), partitions.len());
            let log = &mut partitions[partition];
            log.push(message);

            Position {
                topic: topic.to_string(),
                partition: partition as i32,
                offset: log.len() as i64 - 1,
            }
        };

        self.published.notify_waiters();
        Some(position)
    }

    /// Next offset `group` will read from a partition, if it ever committed.
    pub fn committed_offset(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        let state = self.lock().ok()?;
        state
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// A new member of consumer group `group_id`.
    pub fn consumer(&self, group_id: &str) -> MemoryConsumer {
        MemoryConsumer {
            broker: self.clone(),
            group_id: group_id.to_string(),
            subscription: Mutex::new(None),
        }
    }
}

fn partition_for(key: Option<&[u8]>, partitions: usize) -> usize {
    match key {
        Some(key) if partitions > 1 => {
            let hash = key
                .iter()
                .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u32));
            hash as usize % partitions
        }
        _ => 0,
    }
}

struct Subscription {
    topic: String,
    /// Fetch position of each partition.
    positions: HashMap<i32, i64>,
}

/// A consumer group member reading from a `MemoryBroker`.
pub struct MemoryConsumer {
    broker: MemoryBroker,
    group_id: String,
    subscription: Mutex<Option<Subscription>>,
}

impl MemoryConsumer {
    fn next_delivery(&self) -> Result<Option<Delivery>, StreamError> {
        let mut subscription = self
            .subscription
            .lock()
            .map_err(|_| StreamError::Transport("subscription state poisoned".to_string()))?;
        let Some(sub) = subscription.as_mut() else {
            return Err(StreamError::Transport("consumer is not subscribed".to_string()));
        };

        let state = self.broker.lock()?;
        let Some(partitions) = state.topics.get(&sub.topic) else {
            return Ok(None);
        };

        for (index, log) in partitions.iter().enumerate() {
            let partition = index as i32;
            let committed = state
                .committed
                .get(&(self.group_id.clone(), sub.topic.clone(), partition))
                .copied()
                .unwrap_or(0);
            let position = sub.positions.entry(partition).or_insert(committed);

            if let Some(message) = log.get(*position as usize) {
                let delivery = Delivery {
                    position: Position {
                        topic: sub.topic.clone(),
                        partition,
                        offset: *position,
                    },
                    message: message.clone(),
                };
                *position += 1;
                return Ok(Some(delivery));
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl BusConsumer for MemoryConsumer {
    fn name(&self) -> &str {
        "memory"
    }

    async fn subscribe(&self, topic: &str) -> Result<(), StreamError> {
        let mut subscription = self.subscription.lock().map_err(|_| StreamError::Subscribe {
            topic: topic.to_string(),
            message: "subscription state poisoned".to_string(),
        })?;

        // Positions are loaded lazily from the committed offsets.
        *subscription = Some(Subscription {
            topic: topic.to_string(),
            positions: HashMap::new(),
        });
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<Delivery>, StreamError> {
        let deadline = Instant::now() + timeout;
        loop {
            let published = self.broker.published.notified();
            if let Some(delivery) = self.next_delivery()? {
                return Ok(Some(delivery));
            }
            if tokio::time::timeout_at(deadline, published).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn commit(&self, position: &Position) -> Result<(), StreamError> {
        let mut state = self
            .broker
            .lock()
            .map_err(|e| StreamError::Commit(e.to_string()))?;
        state.committed.insert(
            (
                self.group_id.clone(),
                position.topic.clone(),
                position.partition,
            ),
            position.offset,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(key: &str, value: &str) -> Message {
        Message::new(Some(key), Some(value))
    }

    #[test]
    fn test_same_key_same_partition() {
        let broker = MemoryBroker::new();
        broker.create_topic("t", 4);

        let a = broker.publish("t", message("finding-1", "a")).unwrap();
        let b = broker.publish("t", message("finding-1", "b")).unwrap();

        assert_eq!(a.partition, b.partition);
        assert_eq!(b.offset, a.offset + 1);
    }

    #[tokio::test]
    async fn test_poll_times_out_on_empty_topic() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer("g");
        consumer.subscribe("t").await.unwrap();

        let polled = consumer.poll(Duration::from_millis(20)).await.unwrap();
        assert!(polled.is_none());
    }

    #[tokio::test]
    async fn test_poll_without_subscription_fails() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer("g");

        let err = consumer.poll(Duration::from_millis(5)).await.unwrap_err();
        assert!(matches!(err, StreamError::Transport(_)));
    }

    #[tokio::test]
    async fn test_poll_wakes_on_publish() {
        let broker = MemoryBroker::new();
        let consumer = broker.consumer("g");
        consumer.subscribe("t").await.unwrap();

        let publisher = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish("t", message("k", "late"));
        });

        let delivery = consumer.poll(Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(delivery.message.value.as_deref(), Some(b"late".as_slice()));
    }

    #[tokio::test]
    async fn test_resubscribe_resumes_from_committed_offset() {
        let broker = MemoryBroker::new();
        for i in 0..3 {
            broker.publish("t", message("k", &i.to_string()));
        }

        let consumer = broker.consumer("g");
        consumer.subscribe("t").await.unwrap();
        let first = consumer.poll(Duration::from_millis(5)).await.unwrap().unwrap();
        consumer
            .commit(&Position {
                offset: first.position.offset + 1,
                ..first.position.clone()
            })
            .await
            .unwrap();
        // Read but never committed.
        consumer.poll(Duration::from_millis(5)).await.unwrap().unwrap();

        consumer.subscribe("t").await.unwrap();
        let again = consumer.poll(Duration::from_millis(5)).await.unwrap().unwrap();
        assert_eq!(again.position.offset, 1);
    }

    #[tokio::test]
    async fn test_groups_are_independent() {
        let broker = MemoryBroker::new();
        broker.publish("t", message("k", "v"));

        let a = broker.consumer("a");
        a.subscribe("t").await.unwrap();
        let delivery = a.poll(Duration::from_millis(5)).await.unwrap().unwrap();
        a.commit(&Position {
            offset: 1,
            ..delivery.position
        })
        .await
        .unwrap();

        let b = broker.consumer("b");
        b.subscribe("t").await.unwrap();
        assert!(b.poll(Duration::from_millis(5)).await.unwrap().is_some());
        assert_eq!(broker.committed_offset("b", "t", 0), None);
    }
}
