//! hookforge library
//!
//! Decodes GitHub webhook envelopes taken off a Kafka topic and normalizes
//! them into canonical event records. The modules are exposed for the binary,
//! integration tests and embedding in other services.

pub mod api;
pub mod config;
pub mod error;
pub mod kafka;
pub mod logging;
pub mod models;
pub mod sink;
pub mod stats;
pub mod test_utils;

// Re-export commonly used types at the crate root
pub use config::Config;
pub use error::{Error, Result};

// Re-export model types
pub use models::{
    decode, CanonicalEvent, DecodeError, DecodedEnvelope, NormalizeError, Normalizer, RawEnvelope,
};

// Re-export pipeline types
pub use kafka::{EventConsumer, MessageProcessor, ProcessingOutcome};
pub use sink::{EventSink, StdoutSink};
pub use stats::ProcessingStats;

// Re-export API server functions
pub use api::server::{create_router, create_server, shutdown_signal};

// Re-export health check types
pub use api::{AppState, BuildInfo, ComponentHealth, HealthResponse, HealthState, HealthStatus, ReadyResponse};
