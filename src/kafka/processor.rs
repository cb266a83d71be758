//! Per-message processing for queue deliveries

use crate::error::Error;
use crate::models::{Normalizer, RawEnvelope};
use crate::sink::EventSink;
use crate::stats::ProcessingStats;
use rdkafka::message::{Message, OwnedMessage};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument, Span};

use super::{MessageMetadata, ProcessingOutcome};

/// Runs one delivery through decode, normalize and emit
#[derive(Clone)]
pub struct MessageProcessor {
    normalizer: Normalizer,
    sink: Arc<dyn EventSink>,
    stats: Arc<ProcessingStats>,
}

impl MessageProcessor {
    /// Create a new message processor
    pub fn new(
        normalizer: Normalizer,
        sink: Arc<dyn EventSink>,
        stats: Arc<ProcessingStats>,
    ) -> Self {
        Self {
            normalizer,
            sink,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<ProcessingStats> {
        &self.stats
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Process a single Kafka message
    pub async fn process_message(&self, message: &OwnedMessage) -> ProcessingOutcome {
        let metadata = MessageMetadata {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            timestamp: message.timestamp().to_millis(),
        };

        let span = crate::message_span!(metadata.partition, metadata.offset);
        debug!(
            parent: &span,
            topic = %metadata.topic,
            timestamp = ?metadata.timestamp,
            "Processing message"
        );

        self.process_payload(message.payload())
            .instrument(span)
            .await
    }

    /// Process a raw delivery payload
    ///
    /// Never fails: every problem is logged, counted, and reported through
    /// the returned outcome.
    pub async fn process_payload(&self, payload: Option<&[u8]>) -> ProcessingOutcome {
        let outcome = self.handle(payload).await;

        Span::current().record("outcome", outcome.label());
        self.stats.record(&outcome);
        outcome
    }

    async fn handle(&self, payload: Option<&[u8]>) -> ProcessingOutcome {
        let payload = match payload {
            Some(data) => data,
            None => {
                info!("Message has no payload, skipping");
                return ProcessingOutcome::Skipped("empty message payload".to_string());
            },
        };

        let envelope = match RawEnvelope::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                info!(error = %e, bytes = payload.len(), "Message is not an envelope, skipping");
                return ProcessingOutcome::Skipped(format!("not an envelope: {}", e));
            },
        };

        let decoded = match envelope.decode() {
            Ok(decoded) => decoded,
            Err(e) => return ProcessingOutcome::Rejected(Error::from(e)),
        };
        Span::current().record("event_type", decoded.event_type.as_str());

        let event = match self.normalizer.normalize_envelope(decoded) {
            Ok(event) => event,
            Err(e) => return ProcessingOutcome::Rejected(Error::from(e)),
        };

        if let Err(e) = self.sink.emit(&event).await {
            warn!(
                sink = self.sink.name(),
                event_type = %event.event_type,
                id = %event.id,
                error = %e,
                "Sink rejected normalized event"
            );
            return ProcessingOutcome::SinkFailed(e);
        }

        debug!(event_type = %event.event_type, id = %event.id, "Emitted normalized event");
        ProcessingOutcome::Emitted {
            event_type: event.event_type,
            id: event.id,
        }
    }
}
