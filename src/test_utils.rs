//! Test utilities for hookforge
//!
//! In-memory sink, offset committer and envelope builders shared by unit
//! and integration tests.

use async_trait::async_trait;
use rdkafka::message::{OwnedMessage, Timestamp};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::kafka::OffsetCommitter;
use crate::models::{CanonicalEvent, RawEnvelope, EVENT_TYPE_HEADER, SIGNATURE_HEADER};
use crate::sink::EventSink;

/// Topic name used for in-memory queue messages
pub const TEST_TOPIC: &str = "github";

/// Sink that keeps every record in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<CanonicalEvent>>>,
    fail_next: Arc<Mutex<Option<String>>>,
    emit_delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    /// Create a new empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each emit open for `delay`, so overlapping emits can be observed
    pub fn with_emit_delay(mut self, delay: Duration) -> Self {
        self.emit_delay = Some(delay);
        self
    }

    /// Most emits ever running at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Configure the sink to fail on the next emit
    pub fn fail_next_operation(&self, error_message: &str) {
        *lock(&self.fail_next) = Some(error_message.to_string());
    }

    /// All records emitted so far
    pub fn events(&self) -> Vec<CanonicalEvent> {
        lock(&self.events).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn emit(&self, event: &CanonicalEvent) -> Result<()> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.emit_delay {
            tokio::time::sleep(delay).await;
        }

        let result = match lock(&self.fail_next).take() {
            Some(message) => Err(Error::sink(message)),
            None => {
                lock(&self.events).push(event.clone());
                Ok(())
            },
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Offset committer that records every commit
#[derive(Debug, Default)]
pub struct RecordingCommitter {
    commits: Mutex<Vec<Vec<(i32, i64)>>>,
    assigned: Option<HashSet<i32>>,
}

impl RecordingCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report only `partitions` as assigned
    pub fn with_assignment(partitions: impl IntoIterator<Item = i32>) -> Self {
        Self {
            assigned: Some(partitions.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Every committed position list, oldest first
    pub fn commits(&self) -> Vec<Vec<(i32, i64)>> {
        lock(&self.commits).clone()
    }
}

impl OffsetCommitter for RecordingCommitter {
    fn commit_offsets(&self, positions: &[(i32, i64)]) -> Result<()> {
        lock(&self.commits).push(positions.to_vec());
        Ok(())
    }

    fn assigned_partitions(&self) -> Option<HashSet<i32>> {
        self.assigned.clone()
    }
}

/// A queue message as the consumer receives it
pub fn queue_message(partition: i32, offset: i64, payload: Vec<u8>) -> OwnedMessage {
    OwnedMessage::new(
        Some(payload),
        None,
        TEST_TOPIC.to_string(),
        Timestamp::NotAvailable,
        partition,
        offset,
        None,
    )
}

/// Header map text for an event type, as the webhook gateway writes it
pub fn header_json(event_type: &str, signature: &str) -> String {
    json!({
        EVENT_TYPE_HEADER: [event_type],
        SIGNATURE_HEADER: [signature],
        "Content-Type": ["application/json"],
    })
    .to_string()
}

/// Build an envelope with a well-formed header
pub fn envelope(event_type: &str, body: &Value) -> RawEnvelope {
    RawEnvelope::new(header_json(event_type, "sha1=test"), body.to_string())
}

/// Serialize an envelope into a queue delivery payload
pub fn delivery(event_type: &str, body: &Value) -> Vec<u8> {
    serde_json::to_vec(&envelope(event_type, body)).unwrap_or_default()
}

/// Minimal valid body for each supported event type
pub fn sample_body(event_type: &str) -> Option<Value> {
    let body = match event_type {
        "push" => json!({"head_commit": {"id": "c1", "timestamp": "2024-01-01T00:00:00Z"}}),
        "pull_request" => json!({
            "number": 42,
            "repository": {"name": "repo"},
            "pull_request": {"updated_at": "2024-01-01T00:00:00Z"}
        }),
        "pull_request_review" => {
            json!({"review": {"id": 1, "submitted_at": "2024-01-01T00:00:00Z"}})
        },
        "pull_request_review_comment" | "issue_comment" => {
            json!({"comment": {"id": 2, "updated_at": "2024-01-01T00:00:00Z"}})
        },
        "issues" => json!({
            "repository": {"name": "repo"},
            "issue": {"number": 7, "updated_at": "2024-01-01T00:00:00Z"}
        }),
        "check_run" => json!({"check_run": {"id": 3, "completed_at": "2024-01-01T00:00:00Z"}}),
        "check_suite" => {
            json!({"check_suite": {"id": 4, "updated_at": "2024-01-01T00:00:00Z"}})
        },
        "deployment_status" => {
            json!({"deployment_status": {"id": 5, "updated_at": "2024-01-01T00:00:00Z"}})
        },
        "status" => json!({"id": 6, "updated_at": "2024-01-01T00:00:00Z"}),
        "release" => json!({"release": {"id": 8, "published_at": "2024-01-01T00:00:00Z"}}),
        _ => return None,
    };
    Some(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{rules, Normalizer};
    use serde_json::Map;

    fn event() -> CanonicalEvent {
        CanonicalEvent {
            event_type: "status".to_string(),
            id: "6".to_string(),
            metadata: Map::new(),
            time_created: "2024-01-01T00:00:00Z".to_string(),
            signature: "s".to_string(),
            source: "github".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.emit(&event()).await.unwrap();
        assert_eq!(sink.len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_memory_sink_failure() {
        let sink = MemorySink::new();
        sink.fail_next_operation("Test error");

        assert!(sink.emit(&event()).await.is_err());
        assert!(sink.emit(&event()).await.is_ok());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_sink_tracks_overlapping_emits() {
        let sink = MemorySink::new().with_emit_delay(Duration::from_millis(10));
        let event = event();

        let (first, second) = tokio::join!(sink.emit(&event), sink.emit(&event));
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(sink.peak_in_flight(), 2);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_recording_committer() {
        let committer = RecordingCommitter::with_assignment([0, 1]);
        committer.commit_offsets(&[(0, 3)]).unwrap();

        assert_eq!(committer.commits(), vec![vec![(0, 3)]]);
        assert_eq!(committer.assigned_partitions().map(|p| p.len()), Some(2));
        assert!(RecordingCommitter::new().assigned_partitions().is_none());
    }

    #[test]
    fn test_sample_bodies_normalize() {
        let normalizer = Normalizer::default();
        for event_type in rules::known_event_types() {
            let body = sample_body(event_type).unwrap();
            let decoded = envelope(event_type, &body).decode().unwrap();
            assert!(
                normalizer.normalize_envelope(decoded).is_ok(),
                "sample body for {} does not normalize",
                event_type
            );
        }
    }
}
