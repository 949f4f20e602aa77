//! Pipeline orchestrator - wires source, dispatcher and sinks together.
//!
//! Runs against Kafka (feature `kafka`) or against a generated mock source
//! with a log-only sink.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use contracts::{ErrorSink, MessageSink, MessageSource, Observer, RelayBlueprint};
use dispatcher::{observer_for, Dispatcher, DispatcherConfig, LogErrorSink, LogSink};
use ingestion::{MockSource, SourceConfig, SourceRunner};
use observability::RelayStatsAggregator;
use tracing::{info, warn};

use super::RelayStats;
use crate::error::CliError;

/// How often in-flight publishes are sampled for the summary
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Generated source settings
#[derive(Debug, Clone, Copy)]
pub struct MockSettings {
    /// Number of messages to generate
    pub count: usize,
    /// Delay between messages
    pub interval: Duration,
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated relay configuration
    pub blueprint: RelayBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Run against a generated source instead of Kafka
    pub mock: Option<MockSettings>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the source ends or `shutdown` resolves
    ///
    /// On shutdown the source is stopped, the dispatcher drains, and the
    /// run completes normally. A fatal source error is returned as `Err`
    /// after the dispatcher has drained.
    pub async fn run<F>(self, shutdown: F) -> Result<RelayStats>
    where
        F: Future<Output = ()>,
    {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        match self.config.mock {
            Some(mock) => self.run_mock(mock, shutdown).await,
            None => self.run_kafka(shutdown).await,
        }
    }

    /// Generated source, log-only sink
    async fn run_mock<F>(self, mock: MockSettings, shutdown: F) -> Result<RelayStats>
    where
        F: Future<Output = ()>,
    {
        let kafka = &self.config.blueprint.kafka;
        info!(
            count = mock.count,
            interval_ms = mock.interval.as_millis() as u64,
            "Running in MOCK mode (no broker required)"
        );

        let source = MockSource::generate(&kafka.source_topic, mock.count, mock.interval);
        let sink = LogSink::new("log", &kafka.destination_topic);
        let blueprint = &self.config.blueprint;
        let observer = observer_for(blueprint.relay.observer);
        relay(source, sink, LogErrorSink::new(), observer, blueprint, shutdown).await
    }

    /// Kafka source and sink
    #[cfg(feature = "kafka")]
    async fn run_kafka<F>(self, shutdown: F) -> Result<RelayStats>
    where
        F: Future<Output = ()>,
    {
        use anyhow::Context;
        use dispatcher::{DeadLetterSink, KafkaSink};
        use ingestion::KafkaSource;

        let blueprint = &self.config.blueprint;
        let kafka = &blueprint.kafka;
        let delivery_timeout = Duration::from_millis(blueprint.relay.delivery_timeout_ms);

        info!(
            brokers = %kafka.brokers,
            source = %kafka.source_topic,
            destination = %kafka.destination_topic,
            group_id = %kafka.group_id,
            "Connecting to Kafka..."
        );

        let source = KafkaSource::connect(kafka, blueprint.relay.offset_policy)
            .with_context(|| format!("Failed to connect to Kafka at {}", kafka.brokers))?;
        let sink = KafkaSink::connect("kafka", kafka, &kafka.destination_topic, delivery_timeout)
            .map_err(CliError::from)?;

        let observer = observer_for(blueprint.relay.observer);
        match &blueprint.relay.dead_letter_topic {
            Some(dlq_topic) => {
                info!(dlq = %dlq_topic, "Failed publishes go to dead-letter topic");
                let dlq = KafkaSink::connect("dead_letter", kafka, dlq_topic, delivery_timeout)
                    .map_err(CliError::from)?;
                let errors = DeadLetterSink::new(dlq);
                relay(source, sink, errors, observer, blueprint, shutdown).await
            }
            None => relay(source, sink, LogErrorSink::new(), observer, blueprint, shutdown).await,
        }
    }

    #[cfg(not(feature = "kafka"))]
    async fn run_kafka<F>(self, _shutdown: F) -> Result<RelayStats>
    where
        F: Future<Output = ()>,
    {
        anyhow::bail!("built without Kafka support; use --mock N")
    }
}

/// Run one source through the dispatcher to completion
///
/// The source is stopped as soon as the dispatcher task ends, so a crashed
/// dispatcher cannot leave an idle source running.
async fn relay<S, K, E, F>(
    source: S,
    sink: K,
    errors: E,
    observer: Box<dyn Observer>,
    blueprint: &RelayBlueprint,
    shutdown: F,
) -> Result<RelayStats>
where
    S: MessageSource + 'static,
    K: MessageSink + Sync + 'static,
    E: ErrorSink + Sync + 'static,
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let relay_config = &blueprint.relay;

    let runner = SourceRunner::new(
        source,
        SourceConfig::new(relay_config.channel_capacity, relay_config.offset_policy),
    );
    let (source_handle, rx) = runner.spawn();
    let source_name = source_handle.name().to_string();
    let source_metrics = Arc::clone(source_handle.metrics());

    let mut dispatcher = Dispatcher::new(
        sink,
        errors,
        observer,
        rx,
        DispatcherConfig::from_relay(relay_config),
    );
    if let Some(tx) = source_handle.settlement_sender() {
        dispatcher = dispatcher.with_settlement(tx);
    }
    let relay_metrics = dispatcher.metrics();
    let mut dispatch = dispatcher.spawn();

    info!(
        source = %source_name,
        observer = ?relay_config.observer,
        offset_policy = ?relay_config.offset_policy,
        "Relay running"
    );

    let mut aggregator = RelayStatsAggregator::new();
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    let mut stopping = false;
    tokio::pin!(shutdown);

    let joined = loop {
        tokio::select! {
            joined = &mut dispatch => break joined,
            _ = &mut shutdown, if !stopping => {
                warn!("Received shutdown signal, stopping source...");
                source_handle.stop();
                stopping = true;
            }
            _ = ticker.tick() => aggregator.sample_in_flight(relay_metrics.in_flight()),
        }
    };
    source_handle.stop();

    let exit = source_handle.join().await;
    let report = joined.map_err(CliError::from)?;

    let counts = RelayStats::counts(&report, &source_metrics.snapshot());
    let summary = aggregator.summary(counts, started.elapsed());

    let completion = exit.into_result().map_err(CliError::from)?;
    info!(
        received = counts.received,
        published = counts.published,
        failed = counts.failed,
        aborted = counts.aborted,
        ?completion,
        "Relay finished"
    );

    Ok(RelayStats {
        source: source_name,
        completion,
        summary,
    })
}
