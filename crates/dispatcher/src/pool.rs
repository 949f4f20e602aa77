//! PublishPool - launch-and-track publish tasks
//!
//! Every inbound message gets its own short-lived task. Tasks live in a
//! `JoinSet` so shutdown can join them; a `Semaphore` caps how many are
//! outstanding at once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{ErrorSink, Message, MessageSink, PublishFailure, RecordOrigin};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, instrument, warn};

use crate::error::DispatcherError;
use crate::metrics::RelayMetrics;

/// Outcome of joining the pool at shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Tasks joined normally
    pub completed: usize,
    /// Tasks aborted after the drain timeout
    pub aborted: usize,
    /// Whether the timeout fired
    pub timed_out: bool,
}

/// Decrements the in-flight gauge when a task ends, including on abort
struct InFlightGuard {
    metrics: Arc<RelayMetrics>,
    _permit: OwnedSemaphorePermit,
}

impl InFlightGuard {
    fn new(metrics: Arc<RelayMetrics>, permit: OwnedSemaphorePermit) -> Self {
        metrics.task_started();
        Self {
            metrics,
            _permit: permit,
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.task_ended();
    }
}

/// Bounded set of publish tasks
pub struct PublishPool<S, E> {
    sink: Arc<S>,
    errors: Arc<E>,
    metrics: Arc<RelayMetrics>,
    settlement: Option<mpsc::UnboundedSender<RecordOrigin>>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl<S, E> PublishPool<S, E>
where
    S: MessageSink + Sync + 'static,
    E: ErrorSink + Sync + 'static,
{
    /// Create a pool allowing `max_in_flight` outstanding publishes
    pub fn new(sink: S, errors: E, max_in_flight: usize, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            sink: Arc::new(sink),
            errors: Arc::new(errors),
            metrics,
            settlement: None,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Report each settled origin (ack or reported failure) on `tx`
    pub fn with_settlement(mut self, tx: mpsc::UnboundedSender<RecordOrigin>) -> Self {
        self.settlement = Some(tx);
        self
    }

    /// Publish tasks currently running
    pub fn in_flight(&self) -> usize {
        self.metrics.in_flight()
    }

    /// Start a publish task for `message`
    ///
    /// Suspends only while all `max_in_flight` permits are taken. Fails once
    /// the pool has been drained.
    pub async fn launch(&mut self, message: Message) -> Result<(), DispatcherError> {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return Err(DispatcherError::PoolClosed {
                    topic: message.origin.topic,
                    partition: message.origin.partition,
                    offset: message.origin.offset,
                })
            }
        };

        self.reap();

        let guard = InFlightGuard::new(Arc::clone(&self.metrics), permit);
        let sink = Arc::clone(&self.sink);
        let errors = Arc::clone(&self.errors);
        let metrics = Arc::clone(&self.metrics);
        let settlement = self.settlement.clone();

        self.tasks.spawn(async move {
            let _guard = guard;
            let origin = message.origin.clone();
            publish_one(sink.as_ref(), errors.as_ref(), &metrics, message).await;
            if let Some(tx) = settlement {
                // Source has already gone away on a fatal exit
                let _ = tx.send(origin);
            }
        });
        Ok(())
    }

    /// Join tasks that already finished, without waiting
    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            self.on_joined(result);
        }
    }

    /// Returns true when the task was cancelled
    fn on_joined(&self, result: Result<(), JoinError>) -> bool {
        match result {
            Ok(()) => false,
            Err(e) if e.is_cancelled() => true,
            Err(e) => {
                self.metrics.inc_panicked();
                error!(error = ?e, "Publish task panicked");
                false
            }
        }
    }

    /// Wait for every outstanding publish and close the pool
    ///
    /// With a timeout, tasks still running at the deadline are aborted and
    /// counted in `RelayMetrics::aborted`. Their messages are never settled.
    #[instrument(name = "publish_pool_drain", skip(self), fields(pending = self.tasks.len()))]
    pub async fn drain(&mut self, timeout: Option<Duration>) -> DrainSummary {
        self.permits.close();
        let started = Instant::now();
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let mut summary = DrainSummary::default();

        loop {
            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            summary.timed_out = true;
                            break;
                        }
                    }
                }
                None => self.tasks.join_next().await,
            };
            match next {
                Some(result) => {
                    self.on_joined(result);
                    summary.completed += 1;
                }
                None => break,
            }
        }

        if summary.timed_out {
            warn!(
                remaining = self.tasks.len(),
                "Drain timeout reached, aborting outstanding publishes"
            );
            self.tasks.abort_all();
            while let Some(result) = self.tasks.join_next().await {
                if self.on_joined(result) {
                    summary.aborted += 1;
                } else {
                    summary.completed += 1;
                }
            }
            self.metrics.add_aborted(summary.aborted as u64);
        }

        debug!(
            completed = summary.completed,
            aborted = summary.aborted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Publish pool drained"
        );
        summary
    }
}

/// Publish one message and route a failure to the error sink
async fn publish_one<S: MessageSink, E: ErrorSink>(
    sink: &S,
    errors: &E,
    metrics: &RelayMetrics,
    message: Message,
) {
    let started = Instant::now();
    match sink.publish(message.clone()).await {
        Ok(ack) => {
            metrics.record_published(sink.name(), started.elapsed());
            debug!(
                sink = %sink.name(),
                partition = ack.partition,
                offset = ack.offset,
                "Published"
            );
        }
        Err(error) => {
            metrics.record_failed(sink.name());
            errors.report(PublishFailure { message, error }).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_sinks::LogErrorSink;
    use crate::sinks::LogSink;
    use contracts::{Ack, ContractError};
    use tokio::time::sleep;

    struct SlowSink {
        delay: Duration,
    }

    impl MessageSink for SlowSink {
        fn name(&self) -> &str {
            "slow"
        }

        fn topic(&self) -> &str {
            "out"
        }

        async fn publish(&self, message: Message) -> Result<Ack, ContractError> {
            sleep(self.delay).await;
            Ok(Ack {
                topic: "out".into(),
                partition: 0,
                offset: message.origin.offset,
            })
        }
    }

    fn message(offset: i64) -> Message {
        Message::new(None, Some(bytes::Bytes::from("x")), RecordOrigin::new("in", 0, offset))
    }

    #[tokio::test]
    async fn test_drain_joins_all_tasks() {
        let metrics = Arc::new(RelayMetrics::new());
        let mut pool = PublishPool::new(LogSink::new("log", "out"), LogErrorSink::new(), 8, Arc::clone(&metrics));

        for i in 0..20 {
            pool.launch(message(i)).await.unwrap();
        }
        let summary = pool.drain(None).await;

        assert!(!summary.timed_out);
        assert_eq!(summary.aborted, 0);
        assert_eq!(metrics.published(), 20);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_launch_after_drain_is_rejected() {
        let metrics = Arc::new(RelayMetrics::new());
        let mut pool = PublishPool::new(LogSink::new("log", "out"), LogErrorSink::new(), 4, Arc::clone(&metrics));

        pool.launch(message(0)).await.unwrap();
        pool.drain(None).await;

        let err = pool.launch(message(1)).await.unwrap_err();
        assert!(matches!(
            err,
            DispatcherError::PoolClosed { offset: 1, .. }
        ));
        assert_eq!(metrics.published(), 1);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_max_in_flight_is_respected() {
        let metrics = Arc::new(RelayMetrics::new());
        let sink = SlowSink {
            delay: Duration::from_millis(20),
        };
        let mut pool = PublishPool::new(sink, LogErrorSink::new(), 3, Arc::clone(&metrics));

        for i in 0..10 {
            pool.launch(message(i)).await.unwrap();
        }
        pool.drain(None).await;

        assert_eq!(metrics.published(), 10);
        assert!(metrics.peak_in_flight() <= 3);
    }

    #[tokio::test]
    async fn test_drain_timeout_aborts_stragglers() {
        let metrics = Arc::new(RelayMetrics::new());
        let sink = SlowSink {
            delay: Duration::from_secs(30),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pool =
            PublishPool::new(sink, LogErrorSink::new(), 16, Arc::clone(&metrics)).with_settlement(tx);

        for i in 0..4 {
            pool.launch(message(i)).await.unwrap();
        }
        let summary = pool.drain(Some(Duration::from_millis(50))).await;
        drop(pool);

        assert!(summary.timed_out);
        assert_eq!(summary.aborted, 4);
        assert_eq!(metrics.aborted(), 4);
        assert_eq!(metrics.in_flight(), 0);
        // aborted publishes are never settled
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_settlement_reported_per_message() {
        let metrics = Arc::new(RelayMetrics::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pool = PublishPool::new(LogSink::new("log", "out"), LogErrorSink::new(), 4, metrics)
            .with_settlement(tx);

        for i in 0..5 {
            pool.launch(message(i)).await.unwrap();
        }
        pool.drain(None).await;
        drop(pool);

        let mut offsets = Vec::new();
        while let Some(origin) = rx.recv().await {
            offsets.push(origin.offset);
        }
        offsets.sort_unstable();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }
}
