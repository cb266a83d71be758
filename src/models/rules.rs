//! Per-event-type extraction rules
//!
//! Every supported GitHub event type maps to exactly one
//! [`ExtractionRule`]. Supporting a new event type means adding a row to
//! [`RULES`].

use tracing::debug;

use super::error::{ExtractionFailure, NormalizeError};
use super::event::EventDocument;
use super::extract::{Field, FieldKind, FieldPath, Step};

use super::extract::Step::Key;

/// Separator between the parts of a composite identifier
pub const ID_SEPARATOR: &str = "/";

/// How to pull the identity and timestamp out of one event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRule {
    /// Event type this rule applies to
    pub event_type: &'static str,

    /// Identifier parts, joined with [`ID_SEPARATOR`]
    pub id: &'static [Field],

    /// Primary timestamp field
    pub time_created: Field,

    /// Consulted when the primary timestamp is empty (or null)
    pub time_created_fallback: Option<Field>,
}

const fn text(steps: &'static [Step]) -> Field {
    Field {
        path: FieldPath::new(steps),
        kind: FieldKind::Text,
    }
}

const fn integer(steps: &'static [Step]) -> Field {
    Field {
        path: FieldPath::new(steps),
        kind: FieldKind::Integer,
    }
}

const fn identifier(steps: &'static [Step]) -> Field {
    Field {
        path: FieldPath::new(steps),
        kind: FieldKind::Identifier,
    }
}

const REPOSITORY_NAME: Field = text(&[Key("repository"), Key("name")]);

/// The extraction rule table
pub static RULES: &[ExtractionRule] = &[
    ExtractionRule {
        event_type: "push",
        id: &[identifier(&[Key("head_commit"), Key("id")])],
        time_created: text(&[Key("head_commit"), Key("timestamp")]),
        time_created_fallback: None,
    },
    ExtractionRule {
        event_type: "pull_request",
        id: &[REPOSITORY_NAME, integer(&[Key("number")])],
        time_created: text(&[Key("pull_request"), Key("updated_at")]),
        time_created_fallback: None,
    },
    ExtractionRule {
        event_type: "pull_request_review",
        id: &[identifier(&[Key("review"), Key("id")])],
        time_created: text(&[Key("review"), Key("submitted_at")]),
        time_created_fallback: None,
    },
    ExtractionRule {
        event_type: "pull_request_review_comment",
        id: &[identifier(&[Key("comment"), Key("id")])],
        time_created: text(&[Key("comment"), Key("updated_at")]),
        time_created_fallback: None,
    },
    ExtractionRule {
        event_type: "issues",
        id: &[REPOSITORY_NAME, integer(&[Key("issue"), Key("number")])],
        time_created: text(&[Key("issue"), Key("updated_at")]),
        time_created_fallback: None,
    },
    ExtractionRule {
        event_type: "issue_comment",
        id: &[identifier(&[Key("comment"), Key("id")])],
        time_created: text(&[Key("comment"), Key("updated_at")]),
        time_created_fallback: None,
    },
    ExtractionRule {
        event_type: "check_run",
        id: &[identifier(&[Key("check_run"), Key("id")])],
        time_created: text(&[Key("check_run"), Key("completed_at")]),
        time_created_fallback: Some(text(&[Key("check_run"), Key("started_at")])),
    },
    ExtractionRule {
        event_type: "check_suite",
        id: &[identifier(&[Key("check_suite"), Key("id")])],
        time_created: text(&[Key("check_suite"), Key("updated_at")]),
        time_created_fallback: Some(text(&[Key("check_suite"), Key("created_at")])),
    },
    ExtractionRule {
        event_type: "deployment_status",
        id: &[identifier(&[Key("deployment_status"), Key("id")])],
        time_created: text(&[Key("deployment_status"), Key("updated_at")]),
        time_created_fallback: None,
    },
    ExtractionRule {
        event_type: "status",
        id: &[identifier(&[Key("id")])],
        time_created: text(&[Key("updated_at")]),
        time_created_fallback: None,
    },
    ExtractionRule {
        event_type: "release",
        id: &[identifier(&[Key("release"), Key("id")])],
        time_created: text(&[Key("release"), Key("published_at")]),
        time_created_fallback: Some(text(&[Key("release"), Key("created_at")])),
    },
];

/// Find the rule for an event type
pub fn lookup(event_type: &str) -> Option<&'static ExtractionRule> {
    RULES.iter().find(|rule| rule.event_type == event_type)
}

/// All supported event types, in table order
pub fn known_event_types() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|rule| rule.event_type)
}

impl ExtractionRule {
    /// Extract the identifier
    pub fn extract_id(&self, document: &EventDocument) -> Result<String, NormalizeError> {
        let mut parts = Vec::with_capacity(self.id.len());

        for field in self.id {
            let value = field.extract(document).map_err(|f| self.failure(field, f))?;
            if value.is_empty() {
                return Err(self.failure(field, ExtractionFailure::Empty));
            }
            parts.push(value);
        }

        Ok(parts.join(ID_SEPARATOR))
    }

    /// Extract the creation timestamp, consulting the fallback if needed
    pub fn extract_time_created(&self, document: &EventDocument) -> Result<String, NormalizeError> {
        let primary = &self.time_created;

        let value = match self.time_created_fallback {
            Some(_) => primary.extract_nullable(document),
            None => primary.extract(document),
        }
        .map_err(|f| self.failure(primary, f))?;

        if !value.is_empty() {
            return Ok(value);
        }

        let fallback = match &self.time_created_fallback {
            Some(fallback) => fallback,
            None => return Err(self.failure(primary, ExtractionFailure::Empty)),
        };

        debug!(
            event_type = self.event_type,
            primary = %primary.path,
            fallback = %fallback.path,
            "Primary timestamp empty, using fallback"
        );

        let value = fallback.extract(document).map_err(|f| self.failure(fallback, f))?;
        if value.is_empty() {
            return Err(self.failure(fallback, ExtractionFailure::Empty));
        }
        Ok(value)
    }

    fn failure(&self, field: &Field, failure: ExtractionFailure) -> NormalizeError {
        NormalizeError::field(self.event_type, field.path.to_string(), failure)
    }
}
