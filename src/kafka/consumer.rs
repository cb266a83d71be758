//! Kafka envelope consumer with manual offset management

use super::{Dispatcher, KafkaConfig, KafkaIntegrationError, MessageProcessor, OffsetCommitter};
use crate::api::{HealthState, HealthStatus};
use crate::error::{Error, Result};
use anyhow::anyhow;
use futures::stream::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::{BorrowedMessage, OwnedMessage};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::Offset;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

const HEALTH_COMPONENT: &str = "kafka";

fn detach_delivery(delivery: KafkaResult<BorrowedMessage<'_>>) -> KafkaResult<OwnedMessage> {
    delivery.map(|message| message.detach())
}

/// Event consumer that feeds queue deliveries to the processor
pub struct EventConsumer {
    /// Kafka consumer instance
    consumer: Arc<StreamConsumer>,

    /// Configuration
    config: KafkaConfig,

    /// Bounded fan-out and offset bookkeeping
    dispatcher: Dispatcher,

    /// Optional health registry to report into
    health: Option<Arc<HealthState>>,
}

impl EventConsumer {
    /// Create a new event consumer and subscribe to the input topic
    pub fn new(config: KafkaConfig, processor: MessageProcessor, concurrency: usize) -> Result<Self> {
        let consumer: StreamConsumer = config
            .build_consumer_config()
            .create()
            .map_err(|e| Error::from(KafkaIntegrationError::ConnectionError(e)))?;

        consumer.subscribe(&[config.input_topic.as_str()]).map_err(|e| {
            Error::from(KafkaIntegrationError::SubscribeError {
                topic: config.input_topic.clone(),
                source: e,
            })
        })?;

        let dispatcher = Dispatcher::new(processor, concurrency, config.batch_size);

        Ok(Self {
            consumer: Arc::new(consumer),
            config,
            dispatcher,
            health: None,
        })
    }

    /// Report consumer health into a shared registry
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    /// Consume until shutdown is requested or the stream ends
    pub async fn run(&self) -> Result<()> {
        info!(
            topic = %self.config.input_topic,
            group = %self.config.consumer_group,
            concurrency = self.dispatcher.concurrency(),
            "Starting Kafka consumer"
        );
        self.report_health(true, "subscribed").await;

        let stream = self
            .consumer
            .stream()
            .map(detach_delivery);
        let result = self.dispatcher.run(stream, self).await;

        match &result {
            Ok(()) => self.report_health(false, "stopped").await,
            Err(e) => self.report_health(false, &e.to_string()).await,
        }

        if let Err(e) = self.dispatcher.processor().sink().flush() {
            crate::log_error!(e, "Failed to flush output sink");
        }

        info!("Kafka consumer stopped");
        result
    }

    async fn report_health(&self, healthy: bool, message: &str) {
        if let Some(health) = &self.health {
            let status = if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            };
            health
                .update_component(HEALTH_COMPONENT, status, Some(message.to_string()))
                .await;
        }
    }

    /// Request a graceful shutdown
    ///
    /// [`EventConsumer::run`] stops reading, drains in-flight messages,
    /// commits and returns.
    pub fn shutdown(&self) {
        info!("Initiating consumer shutdown");
        self.dispatcher.shutdown();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.dispatcher.is_shutting_down()
    }
}

impl OffsetCommitter for EventConsumer {
    fn commit_offsets(&self, positions: &[(i32, i64)]) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        for &(partition, offset) in positions {
            offsets
                .add_partition_offset(&self.config.input_topic, partition, Offset::Offset(offset))
                .map_err(|e| anyhow!("Failed to track offset: {}", e))?;
        }

        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(|e| Error::from(KafkaIntegrationError::OffsetCommitError(e.to_string())))
    }

    fn assigned_partitions(&self) -> Option<HashSet<i32>> {
        match self.consumer.assignment() {
            Ok(assignment) => Some(
                assignment
                    .elements_for_topic(&self.config.input_topic)
                    .iter()
                    .map(|element| element.partition())
                    .collect(),
            ),
            Err(e) => {
                debug!(error = %e, "Partition assignment unavailable");
                None
            },
        }
    }
}

impl Drop for EventConsumer {
    fn drop(&mut self) {
        self.dispatcher.shutdown();
    }
}
