//! LogSink - logs message summary via tracing

use std::sync::atomic::{AtomicI64, Ordering};

use contracts::{Ack, ContractError, Message, MessageSink};
use tracing::{info, instrument};

/// Sink that logs messages instead of publishing them (dry runs, mock mode)
///
/// Acks carry a synthetic, monotonically increasing offset on partition 0.
pub struct LogSink {
    name: String,
    topic: String,
    next_offset: AtomicI64,
}

impl LogSink {
    /// Create a new LogSink with the given name and nominal topic
    pub fn new(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            next_offset: AtomicI64::new(0),
        }
    }

    fn log_message_summary(&self, message: &Message) {
        info!(
            sink = %self.name,
            topic = %self.topic,
            source_partition = message.origin.partition,
            source_offset = message.origin.offset,
            key_len = message.key.as_ref().map_or(0, |k| k.len()),
            payload_len = message.payload_len(),
            headers = message.headers.len(),
            "Message relayed"
        );
    }
}

impl MessageSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    #[instrument(
        name = "log_sink_publish",
        skip(self, message),
        fields(sink = %self.name, offset = message.origin.offset)
    )]
    async fn publish(&self, message: Message) -> Result<Ack, ContractError> {
        self.log_message_summary(&message);
        Ok(Ack {
            topic: self.topic.clone(),
            partition: 0,
            offset: self.next_offset.fetch_add(1, Ordering::Relaxed),
        })
    }
}
