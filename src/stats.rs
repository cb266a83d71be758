//! Processing counters
//!
//! Lock-free counters updated by every worker and read by the `/metrics`
//! endpoint.

use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;
use crate::kafka::ProcessingOutcome;
use crate::models::NormalizeError;

/// Per-outcome message counters
#[derive(Debug, Default)]
pub struct ProcessingStats {
    received: AtomicU64,
    normalized: AtomicU64,
    skipped: AtomicU64,
    decode_failed: AtomicU64,
    unknown_type: AtomicU64,
    extraction_failed: AtomicU64,
    sink_failed: AtomicU64,
}

/// Point-in-time copy of [`ProcessingStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub normalized: u64,
    pub skipped: u64,
    pub decode_failed: u64,
    pub unknown_type: u64,
    pub extraction_failed: u64,
    pub sink_failed: u64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished message
    pub fn record(&self, outcome: &ProcessingOutcome) {
        self.received.fetch_add(1, Ordering::Relaxed);

        let counter = match outcome {
            ProcessingOutcome::Emitted { .. } => &self.normalized,
            ProcessingOutcome::Skipped(_) => &self.skipped,
            ProcessingOutcome::Rejected(Error::Decode(_)) => &self.decode_failed,
            ProcessingOutcome::Rejected(Error::Normalize(NormalizeError::UnknownEventType(_))) => {
                &self.unknown_type
            },
            ProcessingOutcome::Rejected(_) => &self.extraction_failed,
            ProcessingOutcome::SinkFailed(_) => &self.sink_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            normalized: self.normalized.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            decode_failed: self.decode_failed.load(Ordering::Relaxed),
            unknown_type: self.unknown_type.load(Ordering::Relaxed),
            extraction_failed: self.extraction_failed.load(Ordering::Relaxed),
            sink_failed: self.sink_failed.load(Ordering::Relaxed),
        }
    }

    /// Render counters in the Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let _ = writeln!(
            out,
            "# HELP hookforge_messages_received_total Messages taken off the queue"
        );
        let _ = writeln!(out, "# TYPE hookforge_messages_received_total counter");
        let _ = writeln!(out, "hookforge_messages_received_total {}", snapshot.received);

        let _ = writeln!(
            out,
            "# HELP hookforge_messages_total Finished messages by outcome"
        );
        let _ = writeln!(out, "# TYPE hookforge_messages_total counter");
        for (outcome, value) in [
            ("normalized", snapshot.normalized),
            ("skipped", snapshot.skipped),
            ("decode_failed", snapshot.decode_failed),
            ("unknown_type", snapshot.unknown_type),
            ("extraction_failed", snapshot.extraction_failed),
            ("sink_failed", snapshot.sink_failed),
        ] {
            let _ = writeln!(
                out,
                "hookforge_messages_total{{outcome=\"{}\"}} {}",
                outcome, value
            );
        }

        out
    }
}
