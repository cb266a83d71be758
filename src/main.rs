//! hookforge - GitHub webhook normalizer
//!
//! Consumes webhook envelopes from Kafka, decodes and normalizes them into
//! canonical event records, and hands each record to the configured sink.

use std::sync::Arc;

use hookforge::{
    api::{AppState, HealthState},
    config::Config,
    error::{Error, Result},
    kafka::{EventConsumer, MessageProcessor},
    logging,
    models::Normalizer,
    sink,
    stats::ProcessingStats,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Arc::new(Config::from_env()?);

    // Validate configuration
    config.validate()?;

    // Initialize logging/tracing
    logging::init_tracing(&config.server.log_level, &config.server.environment)?;

    // Log configuration (with sensitive data masked)
    config.log_config();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting hookforge");

    let health = Arc::new(HealthState::new());
    let stats = Arc::new(ProcessingStats::new());

    let sink = sink::from_config(&config)?;
    let processor = MessageProcessor::new(
        Normalizer::new(config.processing.event_source.clone()),
        sink,
        stats.clone(),
    );
    let consumer = Arc::new(
        EventConsumer::new(
            config.kafka.clone(),
            processor,
            config.processing.worker_concurrency,
        )?
        .with_health(health.clone()),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = if config.server.http_enabled {
        let state = AppState::new(health, stats);
        let mut shutdown_rx = shutdown_rx.clone();
        Some(tokio::spawn(hookforge::create_server(
            config.clone(),
            state,
            async move {
                let _ = shutdown_rx.changed().await;
            },
        )))
    } else {
        None
    };

    let mut consumer_task = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.run().await }
    });

    let mut consumer_result = None;
    tokio::select! {
        _ = hookforge::shutdown_signal() => {},
        finished = &mut consumer_task => {
            tracing::warn!("Kafka consumer exited on its own");
            consumer_result = Some(finished);
        },
    }

    consumer.shutdown();
    let _ = shutdown_tx.send(true);

    let consumer_result = match consumer_result {
        Some(finished) => finished,
        None => {
            match tokio::time::timeout(config.server.shutdown_timeout(), consumer_task).await {
                Ok(finished) => finished,
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = config.server.shutdown_timeout_secs,
                        "Timed out waiting for consumer to drain"
                    );
                    Ok(Ok(()))
                },
            }
        },
    };

    if let Some(server) = server {
        match server.await {
            Ok(Err(e)) => hookforge::log_error!(e, "HTTP server failed"),
            Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
            Ok(Ok(())) => {},
        }
    }

    consumer_result.map_err(|e| Error::internal(format!("Consumer task failed: {}", e)))??;

    tracing::info!("hookforge shutdown complete");
    Ok(())
}
