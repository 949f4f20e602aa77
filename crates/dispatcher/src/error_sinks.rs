//! Error sinks - where failed publishes end up

use bytes::Bytes;
use contracts::{ErrorSink, MessageSink, PublishFailure};
use tracing::{error, info, instrument};

/// Header carrying the publish error on dead-lettered messages
pub const HEADER_ERROR: &str = "x-relay-error";
/// Header carrying the source topic on dead-lettered messages
pub const HEADER_SOURCE_TOPIC: &str = "x-relay-source-topic";
/// Header carrying the source partition on dead-lettered messages
pub const HEADER_SOURCE_PARTITION: &str = "x-relay-source-partition";
/// Header carrying the source offset on dead-lettered messages
pub const HEADER_SOURCE_OFFSET: &str = "x-relay-source-offset";

fn log_failure(sink: &str, failure: &PublishFailure) {
    let origin = &failure.message.origin;
    error!(
        sink,
        topic = %origin.topic,
        partition = origin.partition,
        offset = origin.offset,
        error = %failure.error,
        "Publish failed, message discarded"
    );
}

/// Logs each failure at error level and drops the message
#[derive(Debug, Default)]
pub struct LogErrorSink;

impl LogErrorSink {
    pub fn new() -> Self {
        Self
    }
}

impl ErrorSink for LogErrorSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn report(&self, failure: PublishFailure) {
        log_failure(self.name(), &failure);
    }
}

/// Logs each failure, then republishes the message to a dead-letter topic
///
/// The original key, payload and headers are kept; the failure cause and
/// source coordinates are appended as `x-relay-*` headers. A failed
/// dead-letter publish is logged and dropped.
pub struct DeadLetterSink<S> {
    inner: S,
}

impl<S: MessageSink> DeadLetterSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Dead-letter topic
    pub fn topic(&self) -> &str {
        self.inner.topic()
    }
}

impl<S: MessageSink + Sync> ErrorSink for DeadLetterSink<S> {
    fn name(&self) -> &str {
        "dead_letter"
    }

    #[instrument(
        name = "dead_letter_report",
        skip(self, failure),
        fields(dlq = %self.inner.topic(), offset = failure.message.origin.offset)
    )]
    async fn report(&self, failure: PublishFailure) {
        log_failure(self.name(), &failure);

        let PublishFailure { message, error } = failure;
        let origin = message.origin.clone();
        let message = message
            .with_header(HEADER_ERROR, Some(Bytes::from(error.to_string())))
            .with_header(HEADER_SOURCE_TOPIC, Some(Bytes::from(origin.topic.clone())))
            .with_header(
                HEADER_SOURCE_PARTITION,
                Some(Bytes::from(origin.partition.to_string())),
            )
            .with_header(
                HEADER_SOURCE_OFFSET,
                Some(Bytes::from(origin.offset.to_string())),
            );

        match self.inner.publish(message).await {
            Ok(ack) => info!(
                dlq = %ack.topic,
                partition = ack.partition,
                offset = ack.offset,
                "Dead-lettered"
            ),
            Err(e) => error!(
                dlq = %self.inner.topic(),
                topic = %origin.topic,
                partition = origin.partition,
                offset = origin.offset,
                error = %e,
                "Dead-letter publish failed, message lost"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Ack, ContractError, Message, RecordOrigin};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        published: Mutex<Vec<Message>>,
    }

    impl MessageSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn topic(&self) -> &str {
            "relay.dlq"
        }

        async fn publish(&self, message: Message) -> Result<Ack, ContractError> {
            self.published.lock().unwrap().push(message);
            Ok(Ack {
                topic: "relay.dlq".into(),
                partition: 0,
                offset: 0,
            })
        }
    }

    fn failure() -> PublishFailure {
        PublishFailure {
            message: Message::new(
                Some(Bytes::from_static(b"k")),
                Some(Bytes::from_static(b"B")),
                RecordOrigin::new("in", 2, 41),
            ),
            error: ContractError::publish("out", "broker unavailable"),
        }
    }

    #[tokio::test]
    async fn test_log_error_sink_does_not_panic() {
        LogErrorSink::new().report(failure()).await;
    }

    #[tokio::test]
    async fn test_dead_letter_adds_headers() {
        let dlq = DeadLetterSink::new(RecordingSink::default());
        dlq.report(failure()).await;

        let published = dlq.inner.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let msg = &published[0];
        assert_eq!(msg.payload.as_deref(), Some(&b"B"[..]));
        assert_eq!(msg.key.as_deref(), Some(&b"k"[..]));

        let header = |name: &str| {
            msg.headers
                .iter()
                .find(|h| h.name == name)
                .and_then(|h| h.value.clone())
        };
        assert_eq!(header(HEADER_SOURCE_TOPIC), Some(Bytes::from("in")));
        assert_eq!(header(HEADER_SOURCE_PARTITION), Some(Bytes::from("2")));
        assert_eq!(header(HEADER_SOURCE_OFFSET), Some(Bytes::from("41")));
        assert_eq!(
            header(HEADER_ERROR),
            Some(Bytes::from("publish to 'out' failed: broker unavailable"))
        );
    }
}
