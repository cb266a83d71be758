//! Event models for hookforge
//!
//! The decoding and normalization core: raw envelopes come in, canonical
//! events come out. Everything here is synchronous and side-effect free
//! apart from logging.

pub mod envelope;
pub mod error;
pub mod event;
pub mod extract;
pub mod normalizer;
pub mod rules;

// Re-export commonly used types
pub use envelope::{decode, DecodedEnvelope, RawEnvelope, EVENT_TYPE_HEADER, SIGNATURE_HEADER};
pub use error::{DecodeError, EnvelopePart, ExtractionFailure, NormalizeError};
pub use event::{CanonicalEvent, EventDocument};
pub use extract::{Field, FieldKind, FieldPath, Step};
pub use normalizer::{Normalizer, DEFAULT_SOURCE};
pub use rules::{ExtractionRule, RULES};
