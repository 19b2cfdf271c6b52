//! Kafka bus consumer.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer as RdStreamConsumer};
use rdkafka::message::{Headers, Message as _};
use rdkafka::{Offset, TopicPartitionList};
use tracing::debug;

use crate::config::KafkaConfig;

use super::{BusConsumer, Delivery, Message, MetadataEntry, Position, StreamError};

/// Kafka consumer group member.
///
/// Auto commit and offset store are disabled: offsets only move through
/// explicit commits.
pub struct KafkaConsumer {
    consumer: RdStreamConsumer,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig, group_id: &str) -> Result<Self, StreamError> {
        let mut client_config = ClientConfig::new();
        for (key, value) in &config.properties {
            client_config.set(key, value);
        }
        client_config
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false");

        let consumer: RdStreamConsumer = client_config
            .create()
            .map_err(|e| StreamError::Transport(format!("failed to create a consumer: {e}")))?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl BusConsumer for KafkaConsumer {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn subscribe(&self, topic: &str) -> Result<(), StreamError> {
        self.consumer
            .subscribe(&[topic])
            .map_err(|e| StreamError::Subscribe {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<Delivery>, StreamError> {
        let received = match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => return Ok(None),
            Ok(result) => result.map_err(|e| StreamError::Transport(e.to_string()))?,
        };

        let headers = received
            .headers()
            .map(|headers| {
                headers
                    .iter()
                    .map(|h| MetadataEntry {
                        key: h.key.as_bytes().to_vec(),
                        value: h.value.map(<[u8]>::to_vec).unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(Delivery {
            position: Position {
                topic: received.topic().to_string(),
                partition: received.partition(),
                offset: received.offset(),
            },
            message: Message {
                key: received.key().map(<[u8]>::to_vec),
                value: received.payload().map(<[u8]>::to_vec),
                headers,
            },
        }))
    }

    async fn commit(&self, position: &Position) -> Result<(), StreamError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &position.topic,
                position.partition,
                Offset::Offset(position.offset),
            )
            .map_err(|e| StreamError::Commit(e.to_string()))?;

        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(|e| StreamError::Commit(e.to_string()))?;
        debug!(
            topic = %position.topic,
            partition = position.partition,
            offset = position.offset,
            "Committed offset"
        );
        Ok(())
    }
}
