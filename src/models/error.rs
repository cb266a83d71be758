//! Error types for envelope decoding and event normalization
//!
//! These are per-message outcomes: a failure here rejects one delivery and
//! never affects the processing of any other. They are kept separate from
//! the application-level [`crate::error::Error`], which wraps them.

use std::fmt;
use thiserror::Error;

/// Which half of a raw envelope an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePart {
    /// The JSON-encoded header map
    Header,
    /// The JSON-encoded event body
    Body,
}

impl EnvelopePart {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopePart::Header => "header",
            EnvelopePart::Body => "body",
        }
    }
}

impl fmt::Display for EnvelopePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to turn a raw header/body pair into a decoded envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input is absent (or JSON null)
    #[error("{part} is nil")]
    NilInput { part: EnvelopePart },

    /// Input is present but is not text
    #[error("{part} is not a string (found {found})")]
    WrongType {
        part: EnvelopePart,
        found: &'static str,
    },

    /// Input is the empty string
    #[error("received empty {part} message")]
    EmptyInput { part: EnvelopePart },

    /// Input does not parse as a JSON object
    #[error("{part} is not a JSON object: {reason}")]
    MalformedJson { part: EnvelopePart, reason: String },

    /// A required header is missing or not a non-empty array of strings
    #[error("header field '{field}' {problem}")]
    MissingHeaderField {
        field: &'static str,
        problem: &'static str,
    },
}

impl DecodeError {
    /// Short machine-readable name for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::NilInput { .. } => "nil_input",
            DecodeError::WrongType { .. } => "wrong_type",
            DecodeError::EmptyInput { .. } => "empty_input",
            DecodeError::MalformedJson { .. } => "malformed_json",
            DecodeError::MissingHeaderField { .. } => "missing_header_field",
        }
    }

    /// The envelope half this error concerns
    pub fn part(&self) -> EnvelopePart {
        match self {
            DecodeError::NilInput { part }
            | DecodeError::WrongType { part, .. }
            | DecodeError::EmptyInput { part }
            | DecodeError::MalformedJson { part, .. } => *part,
            DecodeError::MissingHeaderField { .. } => EnvelopePart::Header,
        }
    }
}

/// Why a single extraction path could not produce a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// Object has no such key
    #[error("missing key '{0}'")]
    MissingKey(String),

    /// Array is shorter than the requested index
    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Value has the wrong JSON type for this step
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Number cannot be rendered as an integer
    #[error("number {0} is not an integer")]
    NonIntegral(String),

    /// Whole number too large to have been read without rounding
    #[error("number {0} is outside the exactly representable integer range")]
    OutOfRange(String),

    /// Path resolved to an empty string
    #[error("value is empty")]
    Empty,
}

/// Failure to classify or normalize a decoded event
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Event type has no extraction rule
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A required field could not be extracted
    #[error("failed to extract '{path}' from {event_type} event: {failure}")]
    FieldExtraction {
        event_type: String,
        path: String,
        failure: ExtractionFailure,
    },

    /// Canonical record could not be serialized
    #[error("failed to serialize canonical event: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NormalizeError {
    /// Create a field extraction error
    pub fn field(
        event_type: impl Into<String>,
        path: impl Into<String>,
        failure: ExtractionFailure,
    ) -> Self {
        NormalizeError::FieldExtraction {
            event_type: event_type.into(),
            path: path.into(),
            failure,
        }
    }

    /// Short machine-readable name for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizeError::UnknownEventType(_) => "unknown_event_type",
            NormalizeError::FieldExtraction { .. } => "field_extraction",
            NormalizeError::Serialization(_) => "serialization",
        }
    }

    /// The failing path, if this is an extraction error
    pub fn path(&self) -> Option<&str> {
        match self {
            NormalizeError::FieldExtraction { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convert decode errors to application errors
impl From<DecodeError> for crate::error::Error {
    fn from(err: DecodeError) -> Self {
        crate::error::Error::Decode(err)
    }
}

/// Convert normalize errors to application errors
impl From<NormalizeError> for crate::error::Error {
    fn from(err: NormalizeError) -> Self {
        crate::error::Error::Normalize(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display_names_part() {
        let error = DecodeError::NilInput {
            part: EnvelopePart::Header,
        };
        assert_eq!(error.to_string(), "header is nil");

        let error = DecodeError::EmptyInput {
            part: EnvelopePart::Body,
        };
        assert_eq!(error.to_string(), "received empty body message");
    }

    #[test]
    fn test_decode_error_part() {
        let error = DecodeError::MissingHeaderField {
            field: "X-Hub-Signature",
            problem: "is missing",
        };
        assert_eq!(error.part(), EnvelopePart::Header);
        assert_eq!(error.kind(), "missing_header_field");
        assert!(error.to_string().contains("X-Hub-Signature"));
    }

    #[test]
    fn test_field_extraction_display() {
        let error = NormalizeError::field(
            "check_run",
            "check_run.completed_at",
            ExtractionFailure::MissingKey("completed_at".to_string()),
        );
        let display = error.to_string();
        assert!(display.contains("check_run.completed_at"));
        assert!(display.contains("missing key 'completed_at'"));
        assert_eq!(error.path(), Some("check_run.completed_at"));
        assert_eq!(error.kind(), "field_extraction");
    }

    #[test]
    fn test_unknown_event_type_has_no_path() {
        let error = NormalizeError::UnknownEventType("fork".to_string());
        assert_eq!(error.path(), None);
        assert_eq!(error.to_string(), "unknown event type: fork");
    }
}
