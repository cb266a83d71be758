//! Demonstration of envelope decoding and normalization
//!
//! Run with: cargo run --example normalize_demo

use hookforge::{
    models::rules,
    test_utils::{envelope, sample_body},
    Normalizer, RawEnvelope,
};
use serde_json::json;

fn main() {
    println!("=== hookforge Normalization Demo ===\n");

    // Demo 1: Push event end to end
    demo_push_event();
    println!();

    // Demo 2: Every supported event type
    demo_supported_types();
    println!();

    // Demo 3: Fallback timestamp
    demo_fallback_timestamp();
    println!();

    // Demo 4: Rejected envelopes
    demo_rejections();
}

fn demo_push_event() {
    println!("Demo 1: Push Event");
    println!("------------------");

    let raw = RawEnvelope::new(
        r#"{"X-Github-Event":["push"],"X-Hub-Signature":["sha1=deadbeef"]}"#,
        r#"{"head_commit":{"id":"c1","timestamp":"2022-04-05T12:34:56Z"},"ref":"refs/heads/main"}"#,
    );

    let decoded = match raw.decode() {
        Ok(decoded) => decoded,
        Err(e) => {
            println!("Decode failed: {}", e);
            return;
        },
    };
    println!("Decoded event type: {}", decoded.event_type);

    match Normalizer::default().normalize_envelope(decoded) {
        Ok(event) => match event.to_json() {
            Ok(json) => println!("Canonical record:\n{}", json),
            Err(e) => println!("Serialization failed: {}", e),
        },
        Err(e) => println!("Normalization failed: {}", e),
    }
}

fn demo_supported_types() {
    println!("Demo 2: Supported Event Types");
    println!("-----------------------------");

    let normalizer = Normalizer::default();
    for event_type in rules::known_event_types() {
        let Some(body) = sample_body(event_type) else {
            continue;
        };

        let result = envelope(event_type, &body)
            .decode()
            .map_err(|e| e.to_string())
            .and_then(|decoded| {
                normalizer
                    .normalize_envelope(decoded)
                    .map_err(|e| e.to_string())
            });

        match result {
            Ok(event) => println!(
                "  {:<30} id={:<12} time_created={}",
                event_type, event.id, event.time_created
            ),
            Err(e) => println!("  {:<30} failed: {}", event_type, e),
        }
    }
}

fn demo_fallback_timestamp() {
    println!("Demo 3: Fallback Timestamp");
    println!("--------------------------");

    let body = json!({
        "release": {"id": 12, "published_at": null, "created_at": "2024-06-01T00:00:00Z"}
    });

    match envelope("release", &body).decode() {
        Ok(decoded) => match Normalizer::new("github-enterprise").normalize_envelope(decoded) {
            Ok(event) => println!(
                "Draft release uses created_at: {} (source {})",
                event.time_created, event.source
            ),
            Err(e) => println!("Normalization failed: {}", e),
        },
        Err(e) => println!("Decode failed: {}", e),
    }
}

fn demo_rejections() {
    println!("Demo 4: Rejected Envelopes");
    println!("--------------------------");

    let cases = [
        ("empty body", RawEnvelope::new(r#"{"X-Github-Event":["push"]}"#, "")),
        ("malformed header", RawEnvelope::new("{not json", "{}")),
        (
            "missing signature",
            RawEnvelope::new(r#"{"X-Github-Event":["push"]}"#, "{}"),
        ),
        ("unknown event type", envelope("fork", &json!({"forkee": {}}))),
        (
            "missing id",
            envelope("push", &json!({"head_commit": {"timestamp": "2024-01-01T00:00:00Z"}})),
        ),
    ];

    let normalizer = Normalizer::default();
    for (label, raw) in cases {
        let outcome = match raw.decode() {
            Ok(decoded) => match normalizer.normalize_envelope(decoded) {
                Ok(event) => format!("normalized as {}", event.key()),
                Err(e) => format!("normalize error ({}): {}", e.kind(), e),
            },
            Err(e) => format!("decode error ({}): {}", e.kind(), e),
        };
        println!("  {:<20} {}", label, outcome);
    }
}
