//! Error handling module for hookforge
//!
//! This module defines the application-level error type. Per-message
//! decode and normalize failures are wrapped here so the queue glue and the
//! HTTP surface can handle every failure through one type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{DecodeError, NormalizeError};

/// Result type alias for hookforge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hookforge
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka related errors
    #[error("Kafka error: {0}")]
    Kafka(String),

    /// Envelope could not be decoded
    #[error("Decode error: {0}")]
    Decode(DecodeError),

    /// Event could not be normalized
    #[error("Normalize error: {0}")]
    Normalize(NormalizeError),

    /// Output sink rejected a record
    #[error("Sink error: {0}")]
    Sink(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Shutdown in progress
    #[error("Service is shutting down")]
    ShuttingDown,
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a Kafka error
    pub fn kafka<S: Into<String>>(msg: S) -> Self {
        Error::Kafka(msg.into())
    }

    /// Create a sink error
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        Error::Sink(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Decode(_) | Error::Normalize(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_)
            | Error::Kafka(_)
            | Error::Sink(_)
            | Error::Serialization(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error is intrinsic to the message payload
    ///
    /// Payload faults are deterministic: reprocessing the same message
    /// yields the same error.
    pub fn is_message_fault(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::Normalize(_))
    }
}

/// Implement IntoResponse for automatic error responses in Axum
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type(&self),
                "status": status.as_u16(),
            }
        }));

        match status {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
                tracing::error!(error = ?self, "Internal server error");
            },
            _ => {
                tracing::warn!(error = ?self, "Client error");
            },
        }

        (status, body).into_response()
    }
}

/// Get a string representation of the error type
fn error_type(error: &Error) -> &'static str {
    match error {
        Error::Config(_) => "configuration_error",
        Error::Kafka(_) => "kafka_error",
        Error::Decode(_) => "decode_error",
        Error::Normalize(_) => "normalize_error",
        Error::Sink(_) => "sink_error",
        Error::Serialization(_) => "serialization_error",
        Error::Io(_) => "io_error",
        Error::Internal(_) => "internal_error",
        Error::ShuttingDown => "shutting_down",
    }
}

/// Convert from anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Convert from envconfig::Error to our Error type
impl From<envconfig::Error> for Error {
    fn from(err: envconfig::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EnvelopePart;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::from(DecodeError::EmptyInput {
                part: EnvelopePart::Body
            })
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::internal("test").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::ShuttingDown.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_message_fault() {
        assert!(Error::from(NormalizeError::UnknownEventType("fork".into())).is_message_fault());
        assert!(Error::from(DecodeError::NilInput {
            part: EnvelopePart::Header
        })
        .is_message_fault());
        assert!(!Error::kafka("broker down").is_message_fault());
        assert!(!Error::sink("closed").is_message_fault());
    }

    #[test]
    fn test_error_display_wraps_inner() {
        let error = Error::from(NormalizeError::UnknownEventType("fork".into()));
        assert_eq!(error.to_string(), "Normalize error: unknown event type: fork");
    }
}
