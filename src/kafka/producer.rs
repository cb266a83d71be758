//! Kafka sink for normalized records

use super::KafkaIntegrationError;
use crate::error::{Error, Result};
use crate::models::CanonicalEvent;
use crate::sink::EventSink;
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::time::Duration;
use tracing::{debug, error};

/// Publishes canonical events to an output topic
pub struct KafkaSink {
    /// Kafka producer instance
    producer: FutureProducer,

    /// Output topic name
    topic: String,

    /// Timeout for send operations
    send_timeout: Duration,
}

impl KafkaSink {
    /// Create a new Kafka sink
    pub fn new(config: ClientConfig, topic: String) -> Result<Self> {
        let producer: FutureProducer = config
            .create()
            .map_err(|e| Error::from(KafkaIntegrationError::ConnectionError(e)))?;

        Ok(Self {
            producer,
            topic,
            send_timeout: Duration::from_secs(30),
        })
    }

    /// Output topic name
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventSink for KafkaSink {
    async fn emit(&self, event: &CanonicalEvent) -> Result<()> {
        let payload = event.to_json()?;

        // Same type and id always land on the same partition
        let key = event.key();

        let record = FutureRecord::to(&self.topic).payload(&payload).key(&key);

        match self.producer.send(record, self.send_timeout).await {
            Ok((partition, offset)) => {
                debug!(
                    topic = %self.topic,
                    partition,
                    offset,
                    key = %key,
                    "Published normalized event"
                );
                Ok(())
            },
            Err((kafka_error, _)) => {
                error!(
                    topic = %self.topic,
                    key = %key,
                    error = %kafka_error,
                    "Failed to publish normalized event"
                );
                Err(Error::from(KafkaIntegrationError::DeliveryError {
                    topic: self.topic.clone(),
                    reason: kafka_error.to_string(),
                }))
            },
        }
    }

    fn flush(&self) -> Result<()> {
        self.producer
            .flush(self.send_timeout)
            .map_err(|e| Error::from(KafkaIntegrationError::ConnectionError(e)))
    }

    fn name(&self) -> &'static str {
        "kafka"
    }
}

impl Clone for KafkaSink {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            topic: self.topic.clone(),
            send_timeout: self.send_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn create_test_config() -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", "localhost:9092")
            .set("message.timeout.ms", "5000");
        config
    }

    #[test]
    fn test_kafka_sink_creation() {
        let sink = KafkaSink::new(create_test_config(), "github.events.normalized".to_string())
            .unwrap();
        assert_eq!(sink.topic(), "github.events.normalized");
        assert_eq!(sink.name(), "kafka");
    }

    // Integration test would require a running Kafka instance
    #[ignore]
    #[tokio::test]
    async fn test_publish_event() {
        let sink = KafkaSink::new(create_test_config(), "github.events.normalized".to_string())
            .unwrap();
        let event = CanonicalEvent {
            event_type: "status".to_string(),
            id: "1".to_string(),
            metadata: Map::new(),
            time_created: "2024-01-01T00:00:00Z".to_string(),
            signature: "s".to_string(),
            source: "github".to_string(),
        };

        assert!(sink.emit(&event).await.is_ok());
        assert!(sink.flush().is_ok());
    }
}
