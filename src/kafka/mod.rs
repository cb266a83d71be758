//! Kafka integration module for webhook envelopes
//!
//! This module provides:
//! - Envelope consumer with manual offset management
//! - Bounded concurrent processing of deliveries
//! - A producer-backed sink for normalized records
//! - Graceful shutdown with offset commits

mod config;
mod consumer;
mod dispatch;
mod processor;
mod producer;

pub use config::KafkaConfig;
pub use consumer::EventConsumer;
pub use dispatch::{Dispatcher, OffsetCommitter, COMMIT_INTERVAL};
pub use processor::MessageProcessor;
pub use producer::KafkaSink;

use rdkafka::error::KafkaError;
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

use crate::error::Error;

/// Kafka-specific error types
#[derive(Debug, Error)]
pub enum KafkaIntegrationError {
    #[error("Kafka connection error: {0}")]
    ConnectionError(#[from] KafkaError),

    #[error("Subscription to '{topic}' failed: {source}")]
    SubscribeError { topic: String, source: KafkaError },

    #[error("Offset commit failed: {0}")]
    OffsetCommitError(String),

    #[error("Delivery to '{topic}' failed: {reason}")]
    DeliveryError { topic: String, reason: String },
}

impl From<KafkaIntegrationError> for Error {
    fn from(err: KafkaIntegrationError) -> Self {
        match err {
            KafkaIntegrationError::DeliveryError { .. } => Error::Sink(err.to_string()),
            other => Error::Kafka(other.to_string()),
        }
    }
}

/// Kafka message metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMetadata {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: Option<i64>,
}

/// What happened to one delivery
///
/// Every outcome is final: nothing is redelivered, so the offset is
/// committable regardless of which variant is returned.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// Record was normalized and handed to the sink
    Emitted { event_type: String, id: String },

    /// Delivery carried nothing to process
    Skipped(String),

    /// Envelope failed to decode or normalize
    Rejected(Error),

    /// Record was normalized but the sink refused it
    SinkFailed(Error),
}

impl ProcessingOutcome {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingOutcome::Emitted { .. } => "emitted",
            ProcessingOutcome::Skipped(_) => "skipped",
            ProcessingOutcome::Rejected(_) => "rejected",
            ProcessingOutcome::SinkFailed(_) => "sink_failed",
        }
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self, ProcessingOutcome::Emitted { .. })
    }
}

#[derive(Debug, Default)]
struct PartitionOffsets {
    in_flight: BTreeSet<i64>,
    highest_done: Option<i64>,
}

/// Tracks in-flight offsets so commits never skip unfinished messages
///
/// Messages finish out of order under concurrent processing. The
/// committable position for a partition is the lowest offset still in
/// flight, or one past the highest finished offset when nothing is.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    partitions: HashMap<i32, PartitionOffsets>,
    pending: usize,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a message has been dispatched
    pub fn start(&mut self, partition: i32, offset: i64) {
        self.partitions
            .entry(partition)
            .or_default()
            .in_flight
            .insert(offset);
    }

    /// Record that a message has finished
    pub fn finish(&mut self, partition: i32, offset: i64) {
        let entry = self.partitions.entry(partition).or_default();
        entry.in_flight.remove(&offset);
        entry.highest_done = Some(entry.highest_done.map_or(offset, |h| h.max(offset)));
        self.pending += 1;
    }

    /// Finished messages since the last [`OffsetTracker::mark_committed`]
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn mark_committed(&mut self) {
        self.pending = 0;
    }

    /// Next offset to commit for each partition with finished work
    pub fn committable(&self) -> Vec<(i32, i64)> {
        let mut positions: Vec<(i32, i64)> = self
            .partitions
            .iter()
            .filter_map(|(&partition, offsets)| {
                let done = offsets.highest_done?;
                let position = match offsets.in_flight.first() {
                    Some(&lowest) => lowest,
                    None => done + 1,
                };
                Some((partition, position))
            })
            .collect();
        positions.sort_unstable();
        positions
    }

    /// Stop tracking partitions outside `assigned`, returning the dropped ones
    pub fn retain(&mut self, assigned: &HashSet<i32>) -> Vec<i32> {
        let mut dropped: Vec<i32> = self
            .partitions
            .keys()
            .copied()
            .filter(|partition| !assigned.contains(partition))
            .collect();
        dropped.sort_unstable();

        for partition in &dropped {
            self.partitions.remove(partition);
        }
        dropped
    }
}
