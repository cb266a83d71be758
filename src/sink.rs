//! Output sinks for canonical events
//!
//! A sink receives every successfully normalized record. The queue glue
//! depends only on [`EventSink`]; which implementation runs is chosen by
//! configuration.

use async_trait::async_trait;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::kafka::KafkaSink;
use crate::models::CanonicalEvent;

/// Destination for normalized records
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one record
    async fn emit(&self, event: &CanonicalEvent) -> Result<()>;

    /// Flush anything still buffered
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Supported sink implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Stdout,
    Kafka,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Stdout => "stdout",
            SinkKind::Kafka => "kafka",
        }
    }
}

impl FromStr for SinkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(SinkKind::Stdout),
            "kafka" => Ok(SinkKind::Kafka),
            other => Err(Error::config(format!("Unknown output sink: {}", other))),
        }
    }
}

/// Build the sink selected by configuration
pub fn from_config(config: &Config) -> Result<Arc<dyn EventSink>> {
    let kind = config.processing.sink_kind()?;
    info!(sink = kind.as_str(), "Creating output sink");

    match kind {
        SinkKind::Stdout => Ok(Arc::new(StdoutSink::new())),
        SinkKind::Kafka => {
            let sink = KafkaSink::new(
                config.kafka.build_producer_config(),
                config.processing.output_topic.clone(),
            )?;
            Ok(Arc::new(sink))
        },
    }
}

/// Writes one JSON document per line to standard output
#[derive(Debug, Default)]
pub struct StdoutSink {
    // serializes whole lines across concurrent workers
    lock: Mutex<()>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventSink for StdoutSink {
    async fn emit(&self, event: &CanonicalEvent) -> Result<()> {
        let line = event.to_json().map_err(Error::from)?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::sink("stdout sink lock poisoned"))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", line)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        std::io::stdout().flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}
