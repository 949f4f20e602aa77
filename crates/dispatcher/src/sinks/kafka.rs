//! KafkaSink - publishes to the destination topic via rdkafka `FutureProducer`

use std::time::Duration;

use contracts::{Ack, ContractError, KafkaConfig, Message, MessageSink};
use rdkafka::message::{Header as KafkaHeader, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;

/// Sink that forwards key, payload and headers unchanged
pub struct KafkaSink {
    name: String,
    topic: String,
    producer: FutureProducer,
    delivery_timeout: Duration,
}

impl KafkaSink {
    /// Create a producer for `topic` on the configured brokers
    ///
    /// # Errors
    /// Returns `DispatcherError::SinkCreation` if the producer cannot be built.
    #[instrument(
        name = "kafka_sink_connect",
        skip_all,
        fields(brokers = %config.brokers, topic = %topic)
    )]
    pub fn connect(
        name: impl Into<String>,
        config: &KafkaConfig,
        topic: &str,
        delivery_timeout: Duration,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let producer: FutureProducer = producer_config(config, delivery_timeout)
            .create()
            .map_err(|e| DispatcherError::sink_creation(&name, e.to_string()))?;

        info!(sink = %name, topic, "Kafka sink ready");

        Ok(Self {
            name,
            topic: topic.to_string(),
            producer,
            delivery_timeout,
        })
    }
}

/// Build the producer configuration
pub fn producer_config(config: &KafkaConfig, delivery_timeout: Duration) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("client.id", "topic-relay-producer")
        .set(
            "message.timeout.ms",
            delivery_timeout.as_millis().to_string(),
        );

    for (key, value) in &config.producer_properties {
        client.set(key, value);
    }
    client
}

fn kafka_headers(message: &Message) -> OwnedHeaders {
    message
        .headers
        .iter()
        .fold(OwnedHeaders::new(), |headers, h| {
            headers.insert(KafkaHeader {
                key: &h.name,
                value: h.value.as_deref(),
            })
        })
}

impl MessageSink for KafkaSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    #[instrument(
        name = "kafka_sink_publish",
        skip(self, message),
        fields(sink = %self.name, source_offset = message.origin.offset)
    )]
    async fn publish(&self, message: Message) -> Result<Ack, ContractError> {
        let mut record = FutureRecord::<[u8], [u8]>::to(&self.topic).headers(kafka_headers(&message));
        if let Some(key) = message.key.as_deref() {
            record = record.key(key);
        }
        if let Some(payload) = message.payload.as_deref() {
            record = record.payload(payload);
        }

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                debug!(sink = %self.name, partition, offset, "Delivered");
                Ok(Ack {
                    topic: self.topic.clone(),
                    partition,
                    offset,
                })
            }
            Err((e, _)) => {
                warn!(sink = %self.name, error = %e, "Delivery failed");
                Err(ContractError::publish(&self.topic, e.to_string()))
            }
        }
    }
}
