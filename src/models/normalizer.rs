//! Event normalization
//!
//! Turns a decoded envelope into a [`CanonicalEvent`] by applying the
//! extraction rule for its event type. Normalization is pure: the same
//! inputs always yield the same record, so it is never retried.

use tracing::{info, warn};

use super::envelope::DecodedEnvelope;
use super::error::NormalizeError;
use super::event::{CanonicalEvent, EventDocument};
use super::rules;

/// Source tag for events from GitHub
pub const DEFAULT_SOURCE: &str = "github";

/// Applies the extraction rule table to decoded events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalizer {
    source: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE)
    }
}

impl Normalizer {
    /// Create a normalizer that stamps records with `source`
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Source tag applied to every record
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Normalize a single event
    ///
    /// Unknown event types are logged at info level; they are expected as
    /// the platform adds new webhooks. Extraction failures are logged as
    /// warnings with the failing path.
    pub fn normalize(
        &self,
        event_type: &str,
        signature: &str,
        document: EventDocument,
    ) -> Result<CanonicalEvent, NormalizeError> {
        let rule = match rules::lookup(event_type) {
            Some(rule) => rule,
            None => {
                info!(event_type = %event_type, "Received unknown event type");
                return Err(NormalizeError::UnknownEventType(event_type.to_string()));
            },
        };

        // Timestamp first, so it is the reported failure when both are bad
        let extracted = rule
            .extract_time_created(&document)
            .and_then(|time_created| Ok((rule.extract_id(&document)?, time_created)));

        let (id, time_created) = match extracted {
            Ok(fields) => fields,
            Err(e) => {
                warn!(
                    event_type = %event_type,
                    path = e.path().unwrap_or_default(),
                    error = %e,
                    "Failed to extract event fields"
                );
                return Err(e);
            },
        };

        Ok(CanonicalEvent {
            event_type: event_type.to_string(),
            id,
            metadata: document,
            time_created,
            signature: signature.to_string(),
            source: self.source.clone(),
        })
    }

    /// Normalize a decoded envelope
    pub fn normalize_envelope(
        &self,
        envelope: DecodedEnvelope,
    ) -> Result<CanonicalEvent, NormalizeError> {
        let DecodedEnvelope {
            event_type,
            signature,
            document,
        } = envelope;
        self.normalize(&event_type, &signature, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::ExtractionFailure;
    use serde_json::{json, Value};

    fn document(value: Value) -> EventDocument {
        match value {
            Value::Object(map) => map,
            other => panic!("test document must be an object, got {}", other),
        }
    }

    #[test]
    fn test_normalize_push() {
        let body = document(json!({
            "head_commit": {"id": "c1", "timestamp": "2022-04-05T12:34:56Z"}
        }));

        let event = Normalizer::default().normalize("push", "sig1", body.clone()).unwrap();
        assert_eq!(event.event_type, "push");
        assert_eq!(event.id, "c1");
        assert_eq!(event.time_created, "2022-04-05T12:34:56Z");
        assert_eq!(event.signature, "sig1");
        assert_eq!(event.source, "github");
        assert_eq!(event.metadata, body);
    }

    #[test]
    fn test_custom_source() {
        let normalizer = Normalizer::new("github-enterprise");
        let body = document(json!({"id": 5, "updated_at": "2024-01-01T00:00:00Z"}));

        let event = normalizer.normalize("status", "s", body).unwrap();
        assert_eq!(event.source, "github-enterprise");
        assert_eq!(event.id, "5");
    }

    #[test]
    fn test_unknown_event_type() {
        let result = Normalizer::default().normalize("fork", "s", document(json!({"foo": "bar"})));
        assert!(matches!(result, Err(NormalizeError::UnknownEventType(t)) if t == "fork"));
    }

    #[test]
    fn test_pull_request_number_coercion() {
        let body = document(json!({
            "number": 42,
            "repository": {"name": "repo"},
            "pull_request": {"updated_at": "2024-05-05T05:05:05Z"}
        }));

        let event = Normalizer::default().normalize("pull_request", "s", body).unwrap();
        assert_eq!(event.id, "repo/42");
    }

    #[test]
    fn test_pull_request_number_as_string_is_rejected() {
        let body = document(json!({
            "number": "42",
            "repository": {"name": "repo"},
            "pull_request": {"updated_at": "2024-05-05T05:05:05Z"}
        }));

        let err = Normalizer::default().normalize("pull_request", "s", body).unwrap_err();
        assert_eq!(err.path(), Some("number"));
    }

    #[test]
    fn test_check_run_fallback() {
        let body = document(json!({
            "check_run": {"id": "cr1", "completed_at": "", "started_at": "2024-01-01T00:00:00Z"}
        }));

        let event = Normalizer::default().normalize("check_run", "s", body).unwrap();
        assert_eq!(event.time_created, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_timestamp_failure_reported_before_id() {
        let body = document(json!({"head_commit": {"timestamp": 3}}));
        let err = Normalizer::default().normalize("push", "s", body).unwrap_err();
        match err {
            NormalizeError::FieldExtraction {
                event_type,
                path,
                failure,
            } => {
                assert_eq!(event_type, "push");
                assert_eq!(path, "head_commit.timestamp");
                assert_eq!(
                    failure,
                    ExtractionFailure::TypeMismatch {
                        expected: "string",
                        found: "number"
                    }
                );
            },
            other => panic!("unexpected error: {:?}", other),
        }

        let empty = document(json!({"head_commit": {}}));
        let err = Normalizer::default().normalize("push", "s", empty).unwrap_err();
        assert_eq!(err.path(), Some("head_commit.timestamp"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let body = document(json!({
            "release": {"id": 9, "published_at": null, "created_at": "2024-06-01T00:00:00Z"},
            "extra": [1, 2, {"nested": true}]
        }));
        let normalizer = Normalizer::default();

        let first = normalizer.normalize("release", "s", body.clone()).unwrap();
        let second = normalizer.normalize("release", "s", body).unwrap();
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }
}
