//! Kafka configuration module

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kafka configuration settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct KafkaConfig {
    /// Kafka broker addresses (comma-separated)
    #[serde(default = "default_brokers")]
    #[envconfig(from = "KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,

    /// Consumer group ID
    #[serde(default = "default_consumer_group")]
    #[envconfig(from = "KAFKA_CONSUMER_GROUP", default = "hookforge-consumer")]
    pub consumer_group: String,

    /// Topic carrying webhook envelopes
    #[serde(default = "default_input_topic")]
    #[envconfig(from = "KAFKA_INPUT_TOPIC", default = "github")]
    pub input_topic: String,

    /// SASL username
    #[serde(default)]
    #[envconfig(from = "KAFKA_USERNAME")]
    pub username: Option<String>,

    /// SASL password
    #[serde(default)]
    #[envconfig(from = "KAFKA_PASSWORD")]
    pub password: Option<String>,

    /// Security protocol used when credentials are set
    #[serde(default = "default_security_protocol")]
    #[envconfig(from = "KAFKA_SECURITY_PROTOCOL", default = "SASL_SSL")]
    pub security_protocol: String,

    /// Where to start when the group has no committed offset
    #[serde(default = "default_auto_offset_reset")]
    #[envconfig(from = "KAFKA_AUTO_OFFSET_RESET", default = "earliest")]
    pub auto_offset_reset: String,

    /// Session timeout in milliseconds
    #[serde(default = "default_session_timeout")]
    #[envconfig(from = "KAFKA_SESSION_TIMEOUT_MS", default = "30000")]
    pub session_timeout_ms: u32,

    /// Maximum poll interval in milliseconds
    #[serde(default = "default_max_poll_interval")]
    #[envconfig(from = "KAFKA_MAX_POLL_INTERVAL_MS", default = "300000")]
    pub max_poll_interval_ms: u32,

    /// Completed messages between offset commits
    #[serde(default = "default_batch_size")]
    #[envconfig(from = "KAFKA_BATCH_SIZE", default = "100")]
    pub batch_size: usize,

    /// Compression type for the output producer
    #[serde(default = "default_compression_type")]
    #[envconfig(from = "KAFKA_COMPRESSION_TYPE", default = "snappy")]
    pub compression_type: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            consumer_group: default_consumer_group(),
            input_topic: default_input_topic(),
            username: None,
            password: None,
            security_protocol: default_security_protocol(),
            auto_offset_reset: default_auto_offset_reset(),
            session_timeout_ms: default_session_timeout(),
            max_poll_interval_ms: default_max_poll_interval(),
            batch_size: default_batch_size(),
            compression_type: default_compression_type(),
        }
    }
}

impl KafkaConfig {
    /// Create a new KafkaConfig from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        <Self as envconfig::Envconfig>::init_from_env()
    }

    /// Get session timeout as Duration
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms as u64)
    }

    /// Get max poll interval as Duration
    pub fn max_poll_interval(&self) -> Duration {
        Duration::from_millis(self.max_poll_interval_ms as u64)
    }

    /// Get brokers as a vector
    pub fn brokers_list(&self) -> Vec<String> {
        self.brokers.split(',').map(|s| s.trim().to_string()).collect()
    }

    /// Whether SASL credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Username and masked password for logging
    pub fn masked_credentials(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(_)) if !user.is_empty() => format!("{}:***", user),
            (Some(user), None) if !user.is_empty() => user.clone(),
            _ => "none".to_string(),
        }
    }

    /// Build rdkafka consumer configuration
    pub fn build_consumer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.consumer_group)
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set(
                "max.poll.interval.ms",
                self.max_poll_interval_ms.to_string(),
            )
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", &self.auto_offset_reset);

        self.apply_credentials(&mut config);
        config
    }

    /// Build rdkafka producer configuration for the output topic
    pub fn build_producer_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("message.timeout.ms", "30000")
            .set("compression.type", &self.compression_type)
            .set("enable.idempotence", "true")
            .set("acks", "all");

        self.apply_credentials(&mut config);
        config
    }

    fn apply_credentials(&self, config: &mut rdkafka::ClientConfig) {
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config
                .set("security.protocol", &self.security_protocol)
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);
        }
    }
}

// Default value functions
fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_consumer_group() -> String {
    "hookforge-consumer".to_string()
}

fn default_input_topic() -> String {
    "github".to_string()
}

fn default_security_protocol() -> String {
    "SASL_SSL".to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_session_timeout() -> u32 {
    30000 // 30 seconds
}

fn default_max_poll_interval() -> u32 {
    300000 // 5 minutes
}

fn default_batch_size() -> usize {
    100
}

fn default_compression_type() -> String {
    "snappy".to_string()
}
