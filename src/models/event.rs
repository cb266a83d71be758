//! Canonical event record
//!
//! This module defines the normalized output of the pipeline: one
//! [`CanonicalEvent`] per successfully decoded and classified envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::NormalizeError;

/// A decoded event body: an arbitrary JSON object
pub type EventDocument = Map<String, Value>;

/// Normalized event record
///
/// Identified by the `(event_type, id, time_created)` triple. The incoming
/// body is carried through unmodified in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Platform event type (from the `X-Github-Event` header)
    pub event_type: String,

    /// Type-specific identifier
    pub id: String,

    /// The full event body
    pub metadata: EventDocument,

    /// Creation or last-update timestamp, as sent by the platform
    pub time_created: String,

    /// Webhook signature (from the `X-Hub-Signature` header)
    pub signature: String,

    /// Platform this event came from
    pub source: String,
}

impl CanonicalEvent {
    /// Serialize to a single-line JSON string
    pub fn to_json(&self) -> Result<String, NormalizeError> {
        serde_json::to_string(self).map_err(NormalizeError::from)
    }

    /// Stable key for partitioning downstream (`event_type/id`)
    pub fn key(&self) -> String {
        format!("{}/{}", self.event_type, self.id)
    }
}
