//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件 → dispatcher 配置
//! - 模拟 e2e 测试（MockSource → Dispatcher → 脚本化 sink，无需 broker）
//! - 偏移量提交与失败路径

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        Ack, ContractError, ErrorSink, Message, MessageSink, MessageSource, Observer,
        OffsetPolicy, PublishFailure, RelayConfig,
    };
    use dispatcher::{DispatchReport, Dispatcher, DispatcherConfig};
    use ingestion::{SourceConfig, SourceExit, SourceRunner};

    /// Sink with per-offset delays and a failure predicate
    pub struct ScriptedSink {
        pub published: Arc<Mutex<Vec<Message>>>,
        delays: Vec<Duration>,
        fail_when: fn(&Message) -> bool,
    }

    impl ScriptedSink {
        pub fn new() -> Self {
            Self {
                published: Arc::default(),
                delays: Vec::new(),
                fail_when: |_| false,
            }
        }

        /// Delay for the message at source offset `i` is `delays[i]`
        pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
            self.delays = delays;
            self
        }

        pub fn failing_when(mut self, fail_when: fn(&Message) -> bool) -> Self {
            self.fail_when = fail_when;
            self
        }
    }

    impl MessageSink for ScriptedSink {
        fn name(&self) -> &str {
            "scripted"
        }

        fn topic(&self) -> &str {
            "out"
        }

        async fn publish(&self, message: Message) -> Result<Ack, ContractError> {
            let delay = self
                .delays
                .get(message.origin.offset as usize)
                .copied()
                .unwrap_or_default();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if (self.fail_when)(&message) {
                return Err(ContractError::publish("out", "scripted failure"));
            }
            let mut published = self.published.lock().unwrap();
            published.push(message);
            Ok(Ack {
                topic: "out".into(),
                partition: 0,
                offset: published.len() as i64 - 1,
            })
        }
    }

    /// Records observed payloads in order
    #[derive(Clone, Default)]
    pub struct RecordingObserver {
        pub seen: Arc<Mutex<Vec<String>>>,
    }

    impl Observer for RecordingObserver {
        fn name(&self) -> &str {
            "recording"
        }

        fn observe(&mut self, message: &Message) {
            self.seen.lock().unwrap().push(message.payload_text());
        }
    }

    /// Records failed payloads
    #[derive(Clone, Default)]
    pub struct RecordingErrors {
        pub failed: Arc<Mutex<Vec<String>>>,
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

    /// Source → Dispatcher → sink, run to completion
    pub async fn relay<S, K, E>(
        source: S,
        sink: K,
        errors: E,
        observer: Box<dyn Observer>,
        relay_config: &RelayConfig,
    ) -> (DispatchReport, SourceExit)
    where
        S: MessageSource + 'static,
        K: MessageSink + Sync + 'static,
        E: ErrorSink + Sync + 'static,
    {
        let runner = SourceRunner::new(
            source,
            SourceConfig::new(relay_config.channel_capacity, relay_config.offset_policy),
        );
        let (handle, rx) = runner.spawn();

        let mut dispatcher = Dispatcher::new(
            sink,
            errors,
            observer,
            rx,
            DispatcherConfig::from_relay(relay_config),
        );
        if let Some(tx) = handle.settlement_sender() {
            dispatcher = dispatcher.with_settlement(tx);
        }

        let report = dispatcher.run().await;
        let exit = handle.join().await;
        (report, exit)
    }

    pub fn relay_config(offset_policy: OffsetPolicy) -> RelayConfig {
        RelayConfig {
            channel_capacity: 16,
            max_in_flight: 64,
            offset_policy,
            ..RelayConfig::default()
        }
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::OffsetPolicy;
    use dispatcher::DispatcherConfig;
    use ingestion::SourceConfig;

    #[test]
    fn test_config_file_drives_components() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[kafka]
brokers = "kafka:9092"
group_id = "simulator"
source_topic = "route.new-direction"
destination_topic = "route.new-position"

[relay]
channel_capacity = 32
max_in_flight = 8
drain_timeout_ms = 250
offset_policy = "after_publish"
"#,
        )
        .unwrap();

        let blueprint = ConfigLoader::load_from_path(file.path()).unwrap();

        let dispatcher_config = DispatcherConfig::from_relay(&blueprint.relay);
        assert_eq!(dispatcher_config.max_in_flight, 8);
        assert_eq!(
            dispatcher_config.drain_timeout,
            Some(Duration::from_millis(250))
        );

        let source_config = SourceConfig::new(
            blueprint.relay.channel_capacity,
            blueprint.relay.offset_policy,
        );
        assert_eq!(source_config.channel_capacity, 32);
        assert_eq!(source_config.offset_policy, OffsetPolicy::AfterPublish);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use bytes::Bytes;
    use contracts::{Message, OffsetPolicy, RecordOrigin};
    use dispatcher::{DeadLetterSink, DispatcherState, LogErrorSink, NullObserver};
    use ingestion::{CompletionReason, IngestionError, MockEvent, MockSource, SourceExit};
    use rand::Rng;

    use crate::support::{relay, relay_config, RecordingErrors, RecordingObserver, ScriptedSink};

    fn payloads(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("msg-{i}")).collect()
    }

    fn random_delays(n: usize, max_ms: u64) -> Vec<Duration> {
        let mut rng = rand::rng();
        (0..n)
            .map(|_| Duration::from_millis(rng.random_range(0..=max_ms)))
            .collect()
    }

    /// Observer sees inbound order even when publishes complete out of order
    #[tokio::test]
    async fn test_observer_order_matches_inbound() {
        let expected = payloads(50);
        let refs: Vec<&str> = expected.iter().map(String::as_str).collect();
        let source = MockSource::from_payloads("in", &refs);
        let sink = ScriptedSink::new().with_delays(random_delays(50, 20));
        let observer = RecordingObserver::default();
        let seen = observer.seen.clone();

        let (report, exit) = relay(
            source,
            sink,
            LogErrorSink::new(),
            Box::new(observer),
            &relay_config(OffsetPolicy::Auto),
        )
        .await;

        assert!(exit.is_clean());
        assert_eq!(report.published, 50);
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    /// Key, payload and headers reach the destination unchanged
    #[tokio::test]
    async fn test_pass_through_fidelity() {
        let original = Message::new(
            Some(Bytes::from_static(b"vehicle-42")),
            Some(Bytes::from_static(b"{\"lat\":1.5,\"lng\":-3.25}")),
            RecordOrigin::new("in", 0, 0),
        )
        .with_header("trace-id", Some(Bytes::from_static(b"abc123")))
        .with_header("empty", None);

        let source = MockSource::new("mock:in", vec![MockEvent::Message(original.clone())]);
        let sink = ScriptedSink::new();
        let published = sink.published.clone();

        let (report, _) = relay(
            source,
            sink,
            LogErrorSink::new(),
            Box::new(NullObserver),
            &relay_config(OffsetPolicy::Auto),
        )
        .await;

        assert_eq!(report.published, 1);
        let published = published.lock().unwrap();
        assert_eq!(published[0].key, original.key);
        assert_eq!(published[0].payload, original.payload);
        assert_eq!(published[0].headers, original.headers);
    }

    /// A sink that never keeps up does not hold back the observer
    #[tokio::test]
    async fn test_slow_sink_liveness() {
        let source = MockSource::from_payloads("in", &["a", "b", "c", "d", "e"]).hold_open();
        let sink = ScriptedSink::new().with_delays(vec![Duration::from_secs(2); 5]);
        let observer = RecordingObserver::default();
        let seen = observer.seen.clone();

        let config = contracts::RelayConfig {
            drain_timeout_ms: 50,
            ..relay_config(OffsetPolicy::Auto)
        };

        let runner = ingestion::SourceRunner::new(
            source,
            ingestion::SourceConfig::new(config.channel_capacity, config.offset_policy),
        );
        let (handle, rx) = runner.spawn();
        let dispatcher = dispatcher::Dispatcher::new(
            sink,
            LogErrorSink::new(),
            Box::new(observer),
            rx,
            dispatcher::DispatcherConfig::from_relay(&config),
        );
        let task = dispatcher.spawn();

        tokio::time::timeout(Duration::from_millis(500), async {
            while seen.lock().unwrap().len() < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("observer stalled behind slow sink");

        handle.stop();
        let report = task.await.unwrap();
        let exit = handle.join().await;

        assert!(matches!(exit, SourceExit::Completed(CompletionReason::Stopped)));
        assert_eq!(report.published, 0);
        assert_eq!(report.aborted, 5);
        assert_eq!(report.state, DispatcherState::Drained);
    }

    /// A failing publish is reported and the rest of the stream continues
    #[tokio::test]
    async fn test_fault_isolation() {
        let source = MockSource::from_payloads("in", &["A", "B", "C"]);
        let sink = ScriptedSink::new().failing_when(|m| m.payload_text() == "B");
        let published = sink.published.clone();
        let errors = RecordingErrors::default();
        let failed = errors.failed.clone();
        let observer = RecordingObserver::default();
        let seen = observer.seen.clone();

        let (report, exit) = relay(
            source,
            sink,
            errors,
            Box::new(observer),
            &relay_config(OffsetPolicy::Auto),
        )
        .await;

        assert!(exit.is_clean());
        assert_eq!(report.published, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(*failed.lock().unwrap(), vec!["B"]);
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B", "C"]);

        let mut out: Vec<String> = published
            .lock()
            .unwrap()
            .iter()
            .map(Message::payload_text)
            .collect();
        out.sort();
        assert_eq!(out, vec!["A", "C"]);
    }

    /// A single message and then end of stream: everything settles, loop exits
    #[tokio::test]
    async fn test_clean_termination() {
        let source = MockSource::from_payloads("in", &["A"]);
        let sink = ScriptedSink::new().with_delays(vec![Duration::from_millis(30)]);

        let (report, exit) = relay(
            source,
            sink,
            LogErrorSink::new(),
            Box::new(NullObserver),
            &relay_config(OffsetPolicy::Auto),
        )
        .await;

        assert!(matches!(exit, SourceExit::Completed(CompletionReason::EndOfStream)));
        assert_eq!(report.received, 1);
        assert_eq!(report.published, 1);
        assert_eq!(report.aborted, 0);
        assert_eq!(report.state, DispatcherState::Drained);
    }

    /// Every publish ends in exactly one outcome, whatever the timing
    #[tokio::test]
    async fn test_randomized_publishes_all_settle() {
        let expected = payloads(100);
        let refs: Vec<&str> = expected.iter().map(String::as_str).collect();
        let source = MockSource::from_payloads("in", &refs);
        // every seventh message fails
        let sink = ScriptedSink::new()
            .with_delays(random_delays(100, 25))
            .failing_when(|m| m.origin.offset % 7 == 0);
        let errors = RecordingErrors::default();
        let failed = errors.failed.clone();

        let (report, exit) = relay(
            source,
            sink,
            errors,
            Box::new(NullObserver),
            &relay_config(OffsetPolicy::Auto),
        )
        .await;

        assert!(exit.is_clean());
        assert_eq!(report.received, 100);
        assert_eq!(report.published + report.failed, 100);
        assert_eq!(report.failed, 15);
        assert_eq!(failed.lock().unwrap().len(), 15);
    }

    /// Under after-publish, the final commit covers the whole stream
    #[tokio::test]
    async fn test_after_publish_commits_watermark() {
        let expected = payloads(40);
        let refs: Vec<&str> = expected.iter().map(String::as_str).collect();
        let source = MockSource::from_payloads("in", &refs);
        let commits = source.commits();
        let sink = ScriptedSink::new()
            .with_delays(random_delays(40, 15))
            .failing_when(|m| m.origin.offset == 10);

        let (report, exit) = relay(
            source,
            sink,
            LogErrorSink::new(),
            Box::new(NullObserver),
            &relay_config(OffsetPolicy::AfterPublish),
        )
        .await;

        assert!(exit.is_clean());
        assert_eq!(report.published + report.failed, 40);

        let commits = commits.lock().unwrap();
        assert!(!commits.is_empty());
        assert_eq!(commits.last(), Some(&("in".to_string(), 0, 40)));
        // watermark only moves forward
        assert!(commits.windows(2).all(|w| w[0].2 < w[1].2));
    }

    /// Fatal upstream error closes the stream; in-flight work still drains
    #[tokio::test]
    async fn test_fatal_source_error_drains_and_fails() {
        let source = MockSource::new(
            "mock:in",
            vec![
                MockEvent::message("in", 0, "A"),
                MockEvent::PollError("broker transport failure".into()),
                MockEvent::message("in", 1, "B"),
                MockEvent::Fatal("topic authorization failed".into()),
                MockEvent::message("in", 2, "never"),
            ],
        );
        let sink = ScriptedSink::new().with_delays(vec![Duration::from_millis(20); 2]);
        let observer = RecordingObserver::default();
        let seen = observer.seen.clone();

        let (report, exit) = relay(
            source,
            sink,
            LogErrorSink::new(),
            Box::new(observer),
            &relay_config(OffsetPolicy::Auto),
        )
        .await;

        assert_eq!(report.published, 2);
        assert_eq!(report.state, DispatcherState::Drained);
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);
        match exit {
            SourceExit::Failed(IngestionError::SourceFailed { error, .. }) => {
                assert!(error.is_fatal());
            }
            other => panic!("expected fatal exit, got {other:?}"),
        }
    }

    /// Failed publishes land on the dead-letter topic with their cause
    #[tokio::test]
    async fn test_dead_letter_receives_failures() {
        let source = MockSource::from_payloads("in", &["ok", "bad", "ok"]);
        let sink = ScriptedSink::new().failing_when(|m| m.payload_text() == "bad");
        let dlq = ScriptedSink::new();
        let dead_lettered = dlq.published.clone();

        let (report, _) = relay(
            source,
            sink,
            DeadLetterSink::new(dlq),
            Box::new(NullObserver),
            &relay_config(OffsetPolicy::Auto),
        )
        .await;

        assert_eq!(report.failed, 1);
        let dead_lettered = dead_lettered.lock().unwrap();
        assert_eq!(dead_lettered.len(), 1);
        assert_eq!(dead_lettered[0].payload_text(), "bad");
        assert!(dead_lettered[0]
            .headers
            .iter()
            .any(|h| h.name == dispatcher::error_sinks::HEADER_ERROR));
    }
}
