//! Dispatcher - main relay loop

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use contracts::{ErrorSink, Message, MessageSink, Observer, RecordOrigin, RelayConfig};

use crate::metrics::{MetricsSnapshot, RelayMetrics};
use crate::pool::PublishPool;

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum outstanding publish tasks
    pub max_in_flight: usize,
    /// How long the drain barrier waits; `None` waits indefinitely
    pub drain_timeout: Option<Duration>,
}

impl DispatcherConfig {
    /// Derive from the `[relay]` section; `drain_timeout_ms = 0` disables the timeout
    pub fn from_relay(relay: &RelayConfig) -> Self {
        Self {
            max_in_flight: relay.max_in_flight,
            drain_timeout: (relay.drain_timeout_ms > 0)
                .then(|| Duration::from_millis(relay.drain_timeout_ms)),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from_relay(&RelayConfig::default())
    }
}

/// Dispatcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherState {
    /// Consuming the inbound channel
    Running = 0,
    /// Channel closed and empty, publish pool joined
    Drained = 1,
}

/// Shared view of the dispatcher state
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<AtomicU8>);

impl StateHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(DispatcherState::Running as u8)))
    }

    /// Current state
    pub fn get(&self) -> DispatcherState {
        match self.0.load(Ordering::Acquire) {
            0 => DispatcherState::Running,
            _ => DispatcherState::Drained,
        }
    }

    fn set(&self, state: DispatcherState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Final counts returned by `Dispatcher::run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub received: u64,
    pub published: u64,
    pub failed: u64,
    pub aborted: u64,
    pub state: DispatcherState,
}

impl DispatchReport {
    fn from_snapshot(snapshot: MetricsSnapshot, state: DispatcherState) -> Self {
        Self {
            received: snapshot.received,
            published: snapshot.published,
            failed: snapshot.failed,
            aborted: snapshot.aborted,
            state,
        }
    }
}

/// Relays inbound messages to a sink and a local observer
///
/// For every message, a publish task is launched first, then the observer
/// sees the payload. Both happen in arrival order; publish completion order
/// is unspecified.
pub struct Dispatcher<S, E> {
    pool: PublishPool<S, E>,
    observer: Box<dyn Observer>,
    input_rx: mpsc::Receiver<Message>,
    config: DispatcherConfig,
    metrics: Arc<RelayMetrics>,
    state: StateHandle,
}

impl<S, E> Dispatcher<S, E>
where
    S: MessageSink + Sync + 'static,
    E: ErrorSink + Sync + 'static,
{
    /// Create a dispatcher reading from `input_rx`
    pub fn new(
        sink: S,
        errors: E,
        observer: Box<dyn Observer>,
        input_rx: mpsc::Receiver<Message>,
        config: DispatcherConfig,
    ) -> Self {
        let metrics = Arc::new(RelayMetrics::new());
        let pool = PublishPool::new(sink, errors, config.max_in_flight, Arc::clone(&metrics));
        Self {
            pool,
            observer,
            input_rx,
            config,
            metrics,
            state: StateHandle::new(),
        }
    }

    /// Report settled origins to the source for offset commits
    pub fn with_settlement(mut self, tx: mpsc::UnboundedSender<RecordOrigin>) -> Self {
        self.pool = self.pool.with_settlement(tx);
        self
    }

    /// Shared metrics
    pub fn metrics(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Observe the lifecycle from outside the loop
    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Run the dispatcher main loop
    ///
    /// Returns once the inbound channel is closed and drained and every
    /// publish task has been joined (or aborted at the drain timeout).
    #[instrument(
        name = "dispatcher_run",
        skip(self),
        fields(observer = %self.observer.name(), max_in_flight = self.config.max_in_flight)
    )]
    pub async fn run(mut self) -> DispatchReport {
        info!("Dispatcher started");

        while let Some(message) = self.input_rx.recv().await {
            let received = self.metrics.received() + 1;
            self.metrics.inc_received();

            if let Err(e) = self.pool.launch(message.clone()).await {
                error!(error = %e, "Publish not launched");
            }
            self.observer.observe(&message);

            if received % 100 == 0 {
                debug!(
                    messages = received,
                    in_flight = self.pool.in_flight(),
                    "Dispatcher progress"
                );
            }
        }

        info!(
            messages = self.metrics.received(),
            in_flight = self.pool.in_flight(),
            "Dispatcher input closed, draining"
        );

        let summary = self.pool.drain(self.config.drain_timeout).await;
        self.state.set(DispatcherState::Drained);

        let report = DispatchReport::from_snapshot(self.metrics.snapshot(), self.state.get());
        info!(
            received = report.received,
            published = report.published,
            failed = report.failed,
            aborted = report.aborted,
            timed_out = summary.timed_out,
            "Dispatcher drained"
        );
        report
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_sinks::LogErrorSink;
    use crate::observers::NullObserver;
    use crate::sinks::LogSink;
    use bytes::Bytes;
    use contracts::{Ack, ContractError, PublishFailure};
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Mock sink for testing
    struct MockSink {
        delay: Duration,
        fail_payload: Option<&'static str>,
    }

    impl MessageSink for MockSink {
        fn name(&self) -> &str {
            "mock"
        }

        fn topic(&self) -> &str {
            "out"
        }

        async fn publish(&self, message: Message) -> Result<Ack, ContractError> {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if self.fail_payload.is_some_and(|p| message.payload_text() == p) {
                return Err(ContractError::publish("out", "mock failure"));
            }
            Ok(Ack {
                topic: "out".into(),
                partition: 0,
                offset: message.origin.offset,
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingObserver {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Observer for RecordingObserver {
        fn name(&self) -> &str {
            "recording"
        }

        fn observe(&mut self, message: &Message) {
            self.seen.lock().unwrap().push(message.payload_text());
        }
    }

    #[derive(Clone, Default)]
    struct RecordingErrors {
        failed: Arc<Mutex<Vec<String>>>,
    }

    impl ErrorSink for RecordingErrors {
        fn name(&self) -> &str {
            "recording"
        }

        async fn report(&self, failure: PublishFailure) {
            self.failed
                .lock()
                .unwrap()
                .push(failure.message.payload_text());
        }
    }

    fn message(offset: i64, payload: &str) -> Message {
        Message::new(
            None,
            Some(Bytes::copy_from_slice(payload.as_bytes())),
            RecordOrigin::new("in", 0, offset),
        )
    }

    #[tokio::test]
    async fn test_dispatcher_relays_and_observes_in_order() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let observer = RecordingObserver::default();
        let seen = Arc::clone(&observer.seen);

        let dispatcher = Dispatcher::new(
            LogSink::new("log", "out"),
            LogErrorSink::new(),
            Box::new(observer),
            input_rx,
            DispatcherConfig::default(),
        );
        let state = dispatcher.state_handle();
        let handle = dispatcher.spawn();

        for (i, p) in ["a", "b", "c"].iter().enumerate() {
            input_tx.send(message(i as i64, p)).await.unwrap();
        }
        drop(input_tx);

        let report = handle.await.unwrap();
        assert_eq!(report.received, 3);
        assert_eq!(report.published, 3);
        assert_eq!(report.state, DispatcherState::Drained);
        assert_eq!(state.get(), DispatcherState::Drained);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_publish_failure_is_isolated() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let errors = RecordingErrors::default();
        let failed = Arc::clone(&errors.failed);
        let observer = RecordingObserver::default();
        let seen = Arc::clone(&observer.seen);

        let sink = MockSink {
            delay: Duration::ZERO,
            fail_payload: Some("B"),
        };
        let handle = Dispatcher::new(sink, errors, Box::new(observer), input_rx, DispatcherConfig::default())
            .spawn();

        for (i, p) in ["A", "B", "C"].iter().enumerate() {
            input_tx.send(message(i as i64, p)).await.unwrap();
        }
        drop(input_tx);

        let report = handle.await.unwrap();
        assert_eq!(report.published, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(*failed.lock().unwrap(), vec!["B"]);
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_slow_sink_does_not_stall_observer() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let observer = RecordingObserver::default();
        let seen = Arc::clone(&observer.seen);

        let sink = MockSink {
            delay: Duration::from_millis(500),
            fail_payload: None,
        };
        let dispatcher = Dispatcher::new(
            sink,
            LogErrorSink::new(),
            Box::new(observer),
            input_rx,
            DispatcherConfig::default(),
        );
        let metrics = dispatcher.metrics();
        let handle = dispatcher.spawn();

        for i in 0..5 {
            input_tx.send(message(i, &format!("m{i}"))).await.unwrap();
        }

        // All five observed while every publish is still pending
        tokio::time::timeout(Duration::from_millis(200), async {
            while seen.lock().unwrap().len() < 5 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("observer stalled behind slow publishes");
        assert_eq!(metrics.published(), 0);

        drop(input_tx);
        let report = handle.await.unwrap();
        assert_eq!(report.published, 5);
    }

    #[tokio::test]
    async fn test_empty_channel_drains_immediately() {
        let (input_tx, input_rx) = mpsc::channel::<Message>(1);
        drop(input_tx);

        let report = Dispatcher::new(
            LogSink::new("log", "out"),
            LogErrorSink::new(),
            Box::new(NullObserver),
            input_rx,
            DispatcherConfig::default(),
        )
        .run()
        .await;

        assert_eq!(report.received, 0);
        assert_eq!(report.state, DispatcherState::Drained);
    }

    #[test]
    fn test_config_from_relay() {
        let mut relay = RelayConfig::default();
        relay.max_in_flight = 8;
        relay.drain_timeout_ms = 0;

        let config = DispatcherConfig::from_relay(&relay);
        assert_eq!(config.max_in_flight, 8);
        assert!(config.drain_timeout.is_none());
        assert_eq!(
            DispatcherConfig::default().drain_timeout,
            Some(Duration::from_millis(5000))
        );
    }
}
