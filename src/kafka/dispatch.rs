//! Bounded concurrent dispatch of queue deliveries
//!
//! [`Dispatcher::run`] pulls deliveries from a stream, runs each through the
//! [`MessageProcessor`] on its own task, and commits finished offsets through
//! an [`OffsetCommitter`] in batches or on a timer. The stream is generic so
//! the loop runs the same against a broker or an in-memory source.

use super::{MessageProcessor, OffsetTracker};
use crate::error::Result;
use anyhow::anyhow;
use futures::future::FutureExt;
use futures::stream::{Stream, StreamExt};
use rdkafka::error::KafkaResult;
use rdkafka::message::{Message, OwnedMessage};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Interval between time-based offset commits
pub const COMMIT_INTERVAL: Duration = Duration::from_secs(5);

/// Where committable offsets go
pub trait OffsetCommitter: Send + Sync {
    /// Commit `(partition, next offset)` positions
    fn commit_offsets(&self, positions: &[(i32, i64)]) -> Result<()>;

    /// Partitions currently assigned to this member, when known
    ///
    /// Partitions missing from the set are dropped from tracking before
    /// each commit.
    fn assigned_partitions(&self) -> Option<HashSet<i32>> {
        None
    }
}

/// Runs deliveries through the processor with at most `concurrency` in flight
pub struct Dispatcher {
    processor: MessageProcessor,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    batch_size: usize,
    commit_interval: Duration,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
}

impl Dispatcher {
    pub fn new(processor: MessageProcessor, concurrency: usize, batch_size: usize) -> Self {
        let concurrency = concurrency.max(1);

        Self {
            processor,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            batch_size: batch_size.max(1),
            commit_interval: COMMIT_INTERVAL,
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
        }
    }

    /// Override the time-based commit interval
    pub fn with_commit_interval(mut self, interval: Duration) -> Self {
        self.commit_interval = interval;
        self
    }

    pub fn processor(&self) -> &MessageProcessor {
        &self.processor
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Stop reading new deliveries; [`Dispatcher::run`] drains and returns
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.shutdown_notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Consume `stream` until shutdown or end of stream
    ///
    /// Every dispatched task has finished and its offset has been committed
    /// by the time this returns `Ok`.
    pub async fn run<S, C>(&self, stream: S, committer: &C) -> Result<()>
    where
        S: Stream<Item = KafkaResult<OwnedMessage>>,
        C: OffsetCommitter + ?Sized,
    {
        let mut tracker = OffsetTracker::new();
        let mut tasks: JoinSet<(i32, i64)> = JoinSet::new();
        let mut ticker = interval_at(Instant::now() + self.commit_interval, self.commit_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(stream);

        loop {
            if self.is_shutting_down() {
                break;
            }

            tokio::select! {
                _ = self.shutdown_notify.notified() => break,

                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    finish_task(finished, &mut tracker);
                    if tracker.pending() >= self.batch_size {
                        self.commit(&mut tracker, committer)?;
                        ticker.reset();
                    }
                },

                _ = ticker.tick() => {
                    if tracker.pending() > 0 {
                        self.commit(&mut tracker, committer)?;
                    }
                },

                delivery = next_delivery(&self.semaphore, &mut stream) => {
                    let (permit, received) = delivery?;

                    let message = match received {
                        Some(Ok(message)) => message,
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka consumer error");
                            continue;
                        },
                        None => {
                            warn!("Kafka stream ended");
                            break;
                        },
                    };

                    self.spawn(&mut tasks, &mut tracker, permit, message);
                },
            }
        }

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Waiting for in-flight messages");
        }
        while let Some(finished) = tasks.join_next().await {
            finish_task(finished, &mut tracker);
        }

        if tracker.pending() > 0 {
            info!(
                pending = tracker.pending(),
                "Committing pending offsets before shutdown"
            );
            self.commit(&mut tracker, committer)?;
        }

        Ok(())
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<(i32, i64)>,
        tracker: &mut OffsetTracker,
        permit: OwnedSemaphorePermit,
        message: OwnedMessage,
    ) {
        let partition = message.partition();
        let offset = message.offset();
        tracker.start(partition, offset);

        let processor = self.processor.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let handled = AssertUnwindSafe(processor.process_message(&message))
                .catch_unwind()
                .await;
            if handled.is_err() {
                error!(partition, offset, "Message processing panicked");
            }
            (partition, offset)
        });
    }

    fn commit<C>(&self, tracker: &mut OffsetTracker, committer: &C) -> Result<()>
    where
        C: OffsetCommitter + ?Sized,
    {
        if let Some(assigned) = committer.assigned_partitions() {
            for partition in tracker.retain(&assigned) {
                info!(partition, "Dropping offsets for revoked partition");
            }
        }

        let positions = tracker.committable();
        if !positions.is_empty() {
            committer.commit_offsets(&positions)?;
            debug!(
                messages = tracker.pending(),
                partitions = positions.len(),
                "Committed offsets"
            );
        }

        tracker.mark_committed();
        Ok(())
    }
}

/// Wait for a free slot, then for the next delivery
///
/// Dropping this future before it completes gives the slot back and loses
/// no delivery.
async fn next_delivery<St>(
    semaphore: &Arc<Semaphore>,
    stream: &mut St,
) -> Result<(OwnedSemaphorePermit, Option<St::Item>)>
where
    St: Stream + Unpin,
{
    let permit = semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| anyhow!("Failed to acquire semaphore: {}", e))?;

    Ok((permit, stream.next().await))
}

fn finish_task(finished: std::result::Result<(i32, i64), JoinError>, tracker: &mut OffsetTracker) {
    match finished {
        Ok((partition, offset)) => tracker.finish(partition, offset),
        // Panics are caught inside the task, so this is a cancellation
        Err(e) => error!(error = %e, "Message task did not complete"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Normalizer;
    use crate::stats::ProcessingStats;
    use crate::test_utils::{delivery, queue_message, sample_body, MemorySink, RecordingCommitter};
    use futures::stream;

    fn dispatcher(sink: Arc<MemorySink>, concurrency: usize, batch_size: usize) -> Dispatcher {
        let processor = MessageProcessor::new(
            Normalizer::default(),
            sink,
            Arc::new(ProcessingStats::new()),
        );
        Dispatcher::new(processor, concurrency, batch_size)
    }

    fn status_messages(partition: i32, offsets: std::ops::Range<i64>) -> Vec<KafkaResult<OwnedMessage>> {
        let payload = delivery("status", &sample_body("status").unwrap());
        offsets
            .map(|offset| Ok(queue_message(partition, offset, payload.clone())))
            .collect()
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let dispatcher = dispatcher(Arc::new(MemorySink::new()), 0, 0);
        assert_eq!(dispatcher.concurrency(), 1);
        assert_eq!(dispatcher.batch_size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_offsets_committed_on_interval() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Arc::new(dispatcher(sink.clone(), 4, 100));
        let committer = Arc::new(RecordingCommitter::new());

        // Three deliveries, then the topic goes quiet
        let source = stream::iter(status_messages(0, 0..3)).chain(stream::pending());

        let handle = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let committer = committer.clone();
            async move { dispatcher.run(source, committer.as_ref()).await }
        });

        tokio::time::sleep(COMMIT_INTERVAL / 2).await;
        assert_eq!(sink.len(), 3);
        assert!(committer.commits().is_empty());

        tokio::time::sleep(COMMIT_INTERVAL).await;
        assert_eq!(committer.commits(), vec![vec![(0, 3)]]);

        dispatcher.shutdown();
        handle.await.unwrap().unwrap();
        assert_eq!(committer.commits().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_size_triggers_commit() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Arc::new(dispatcher(sink.clone(), 4, 2));
        let committer = Arc::new(RecordingCommitter::new());

        let source = stream::iter(status_messages(0, 0..4)).chain(stream::pending());

        let handle = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let committer = committer.clone();
            async move { dispatcher.run(source, committer.as_ref()).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        let commits = committer.commits();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits.last(), Some(&vec![(0, 4)]));

        dispatcher.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_revoked_partitions_are_not_committed() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = dispatcher(sink.clone(), 2, 100);
        let committer = RecordingCommitter::with_assignment([0]);

        let mut messages = status_messages(0, 0..2);
        messages.extend(status_messages(1, 10..12));

        dispatcher.run(stream::iter(messages), &committer).await.unwrap();

        assert_eq!(sink.len(), 4);
        assert_eq!(committer.commits(), vec![vec![(0, 2)]]);
    }

    #[tokio::test]
    async fn test_stream_errors_are_skipped() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = dispatcher(sink.clone(), 2, 100);
        let committer = RecordingCommitter::new();

        let mut messages = status_messages(0, 0..1);
        messages.push(Err(rdkafka::error::KafkaError::NoMessageReceived));
        messages.extend(status_messages(0, 1..2));

        dispatcher.run(stream::iter(messages), &committer).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(committer.commits(), vec![vec![(0, 2)]]);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_reads_nothing() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = dispatcher(sink.clone(), 2, 100);
        let committer = RecordingCommitter::new();

        dispatcher.shutdown();
        dispatcher
            .run(stream::iter(status_messages(0, 0..3)), &committer)
            .await
            .unwrap();

        assert!(sink.is_empty());
        assert!(committer.commits().is_empty());
    }
}
