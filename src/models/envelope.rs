//! Envelope decoding
//!
//! A queue delivery carries a `header` and a `body`, each of which should
//! be a JSON-encoded string. Decoding narrows these dynamically-typed
//! values in one place and rejects anything that does not have the
//! expected shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use super::error::{DecodeError, EnvelopePart};
use super::event::EventDocument;
use super::extract::json_type;

/// Header carrying the event type
pub const EVENT_TYPE_HEADER: &str = "X-Github-Event";

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Raw envelope as delivered on the queue
///
/// Both members are kept as untyped JSON so that absent, null, and
/// non-string values can each be reported precisely.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawEnvelope {
    /// JSON-encoded header map
    #[serde(default)]
    pub header: Option<Value>,

    /// JSON-encoded event body
    #[serde(default)]
    pub body: Option<Value>,
}

impl RawEnvelope {
    /// Create an envelope from two text blobs
    pub fn new(header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            header: Some(Value::String(header.into())),
            body: Some(Value::String(body.into())),
        }
    }

    /// Parse a queue delivery payload
    pub fn from_slice(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Decode this envelope
    pub fn decode(&self) -> Result<DecodedEnvelope, DecodeError> {
        decode(self.header.as_ref(), self.body.as_ref())
    }
}

/// A validated envelope, ready for normalization
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEnvelope {
    /// First value of the `X-Github-Event` header
    pub event_type: String,
    /// First value of the `X-Hub-Signature` header
    pub signature: String,
    /// Parsed body
    pub document: EventDocument,
}

/// Decode a raw header/body pair
///
/// Checks run in a fixed order: presence, then type, then emptiness (each
/// header before body), then JSON parsing, then the required headers.
pub fn decode(header: Option<&Value>, body: Option<&Value>) -> Result<DecodedEnvelope, DecodeError> {
    decode_inner(header, body).map_err(|e| {
        match e {
            DecodeError::EmptyInput { .. } => {
                warn!(error = %e, kind = e.kind(), part = %e.part(), "Rejected envelope")
            },
            _ => error!(error = %e, kind = e.kind(), part = %e.part(), "Failed to decode envelope"),
        }
        e
    })
}

fn decode_inner(
    header: Option<&Value>,
    body: Option<&Value>,
) -> Result<DecodedEnvelope, DecodeError> {
    let header = present(header, EnvelopePart::Header)?;
    let body = present(body, EnvelopePart::Body)?;

    let header = text(header, EnvelopePart::Header)?;
    let body = text(body, EnvelopePart::Body)?;

    non_empty(header, EnvelopePart::Header)?;
    non_empty(body, EnvelopePart::Body)?;

    let headers = parse_object(header, EnvelopePart::Header)?;
    let document = parse_object(body, EnvelopePart::Body)?;

    let event_type = header_value(&headers, EVENT_TYPE_HEADER)?;
    let signature = header_value(&headers, SIGNATURE_HEADER)?;

    Ok(DecodedEnvelope {
        event_type,
        signature,
        document,
    })
}

fn present(value: Option<&Value>, part: EnvelopePart) -> Result<&Value, DecodeError> {
    match value {
        None | Some(Value::Null) => Err(DecodeError::NilInput { part }),
        Some(value) => Ok(value),
    }
}

fn text(value: &Value, part: EnvelopePart) -> Result<&str, DecodeError> {
    value.as_str().ok_or(DecodeError::WrongType {
        part,
        found: json_type(value),
    })
}

fn non_empty(value: &str, part: EnvelopePart) -> Result<(), DecodeError> {
    if value.is_empty() {
        Err(DecodeError::EmptyInput { part })
    } else {
        Ok(())
    }
}

fn parse_object(raw: &str, part: EnvelopePart) -> Result<EventDocument, DecodeError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DecodeError::MalformedJson {
            part,
            reason: format!("expected an object, found {}", json_type(&other)),
        }),
        Err(e) => Err(DecodeError::MalformedJson {
            part,
            reason: e.to_string(),
        }),
    }
}

fn header_value(headers: &EventDocument, field: &'static str) -> Result<String, DecodeError> {
    let missing = |problem| DecodeError::MissingHeaderField { field, problem };

    let values = match headers.get(field) {
        None => return Err(missing("is missing")),
        Some(Value::Array(values)) => values,
        Some(_) => return Err(missing("is not an array")),
    };

    match values.first() {
        None => Err(missing("is an empty array")),
        Some(Value::String(value)) if value.is_empty() => Err(missing("has an empty first value")),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(missing("has a non-string first value")),
    }
}
