//! Configuration module for hookforge
//!
//! Loads and validates configuration from environment variables (and a
//! `.env` file for local development).

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::kafka::KafkaConfig;
use crate::sink::SinkKind;

/// Main configuration structure for hookforge
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct Config {
    /// Server configuration
    #[serde(flatten)]
    #[envconfig(nested = true)]
    pub server: ServerConfig,

    /// Kafka configuration
    #[serde(flatten)]
    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    /// Processing configuration
    #[serde(flatten)]
    #[envconfig(nested = true)]
    pub processing: ProcessingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct ServerConfig {
    /// Host to bind to
    #[envconfig(from = "HOST", default = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,

    /// Log level
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[envconfig(from = "ENVIRONMENT", default = "development")]
    pub environment: String,

    /// Request timeout in seconds
    #[envconfig(from = "REQUEST_TIMEOUT_SECS", default = "30")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[envconfig(from = "SHUTDOWN_TIMEOUT_SECS", default = "30")]
    pub shutdown_timeout_secs: u64,

    /// Serve the health and metrics endpoints
    #[envconfig(from = "HTTP_ENABLED", default = "true")]
    pub http_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            environment: "development".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            http_enabled: true,
        }
    }
}

impl ServerConfig {
    /// Get the server address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Processing configuration
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct ProcessingConfig {
    /// Maximum number of messages handled concurrently
    #[envconfig(from = "WORKER_CONCURRENCY", default = "10")]
    pub worker_concurrency: usize,

    /// Source tag stamped on every record
    #[envconfig(from = "EVENT_SOURCE", default = "github")]
    pub event_source: String,

    /// Where normalized records go (stdout, kafka)
    #[envconfig(from = "OUTPUT_SINK", default = "stdout")]
    pub output_sink: String,

    /// Topic for the kafka sink
    #[envconfig(from = "OUTPUT_TOPIC", default = "github.events.normalized")]
    pub output_topic: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_concurrency: 10,
            event_source: "github".to_string(),
            output_sink: "stdout".to_string(),
            output_topic: "github.events.normalized".to_string(),
        }
    }
}

impl ProcessingConfig {
    /// Parse the configured sink kind
    pub fn sink_kind(&self) -> Result<SinkKind> {
        self.output_sink.parse()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            kafka: KafkaConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        Config::init_from_env().map_err(Error::from)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::config("Server port cannot be 0"));
        }

        if self.kafka.brokers.trim().is_empty() {
            return Err(Error::config("Kafka brokers cannot be empty"));
        }

        if self.kafka.input_topic.trim().is_empty() {
            return Err(Error::config("Kafka input topic cannot be empty"));
        }

        if self.kafka.has_credentials() && self.kafka.password.is_none() {
            return Err(Error::config("Kafka username requires a password"));
        }

        if self.processing.worker_concurrency == 0 {
            return Err(Error::config("Worker concurrency must be at least 1"));
        }

        if self.processing.event_source.trim().is_empty() {
            return Err(Error::config("Event source cannot be empty"));
        }

        let sink = self.processing.sink_kind()?;
        if sink == SinkKind::Kafka && self.processing.output_topic.trim().is_empty() {
            return Err(Error::config("Kafka sink requires an output topic"));
        }

        Ok(())
    }

    /// Log configuration (with sensitive data masked)
    pub fn log_config(&self) {
        tracing::info!(
            server_address = %self.server.address(),
            environment = %self.server.environment,
            log_level = %self.server.log_level,
            http_enabled = self.server.http_enabled,
            "Server configuration"
        );

        tracing::info!(
            brokers = %self.kafka.brokers,
            consumer_group = %self.kafka.consumer_group,
            input_topic = %self.kafka.input_topic,
            credentials = %self.kafka.masked_credentials(),
            batch_size = self.kafka.batch_size,
            "Kafka configuration"
        );

        tracing::info!(
            concurrency = self.processing.worker_concurrency,
            source = %self.processing.event_source,
            sink = %self.processing.output_sink,
            output_topic = %self.processing.output_topic,
            "Processing configuration"
        );
    }
}
