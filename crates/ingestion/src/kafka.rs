//! Kafka 消息源
//!
//! 基于 rdkafka `StreamConsumer` 订阅单个 topic，并将 broker 记录转换为 `Message`。

use bytes::Bytes;
use contracts::{
    ContractError, Header, KafkaConfig, Message, MessageSource, OffsetPolicy, RecordOrigin,
};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::Headers;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Kafka 消息源
pub struct KafkaSource {
    name: String,
    topic: String,
    consumer: StreamConsumer,
    /// 每个分区最近一次提交的 next_offset
    committed: HashMap<(String, i32), i64>,
}

impl KafkaSource {
    /// 创建 consumer 并订阅 `source_topic`
    ///
    /// # Errors
    /// consumer 创建或订阅失败时返回 `ContractError::SourceConnection`
    #[instrument(
        name = "kafka_source_connect",
        skip(config),
        fields(brokers = %config.brokers, topic = %config.source_topic, group_id = %config.group_id)
    )]
    pub fn connect(config: &KafkaConfig, policy: OffsetPolicy) -> Result<Self, ContractError> {
        let consumer: StreamConsumer = consumer_config(config, policy)
            .create()
            .map_err(|e| ContractError::source_connection(format!("failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[config.source_topic.as_str()])
            .map_err(|e| ContractError::source_connection(format!("failed to subscribe: {e}")))?;

        info!(topic = %config.source_topic, ?policy, "Kafka source subscribed");

        Ok(Self {
            name: format!("kafka:{}", config.source_topic),
            topic: config.source_topic.clone(),
            consumer,
            committed: HashMap::new(),
        })
    }

    /// 订阅的 topic
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// 构建 consumer 配置
///
/// `AfterPublish` 关闭自动提交，由 runner 根据发布结果提交偏移量。
pub fn consumer_config(config: &KafkaConfig, policy: OffsetPolicy) -> ClientConfig {
    let auto_commit = match policy {
        OffsetPolicy::Auto => "true",
        OffsetPolicy::AfterPublish => "false",
    };

    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.group_id)
        .set("client.id", "topic-relay-consumer")
        .set("auto.offset.reset", config.auto_offset_reset.as_str())
        .set("enable.auto.commit", auto_commit);

    for (key, value) in &config.consumer_properties {
        client.set(key, value);
    }
    client
}

/// 将 broker 记录转换为 `Message`（保留 key / payload / headers）
pub fn to_message<M: rdkafka::Message>(record: &M) -> Message {
    let headers = record
        .headers()
        .map(|hs| {
            hs.iter()
                .map(|h| Header {
                    name: h.key.to_string(),
                    value: h.value.map(Bytes::copy_from_slice),
                })
                .collect()
        })
        .unwrap_or_default();

    Message {
        key: record.key().map(Bytes::copy_from_slice),
        payload: record.payload().map(Bytes::copy_from_slice),
        headers,
        origin: RecordOrigin {
            topic: record.topic().to_string(),
            partition: record.partition(),
            offset: record.offset(),
            timestamp_ms: record.timestamp().to_millis(),
        },
    }
}

/// 每个分区的提交水位
fn watermark_list(committed: &HashMap<(String, i32), i64>) -> KafkaResult<TopicPartitionList> {
    let mut tpl = TopicPartitionList::with_capacity(committed.len());
    for ((topic, partition), next_offset) in committed {
        tpl.add_partition_offset(topic, *partition, Offset::Offset(*next_offset))?;
    }
    Ok(tpl)
}

/// 区分致命错误与可恢复的 poll 错误
pub fn classify(error: KafkaError) -> ContractError {
    let fatal = matches!(
        error.rdkafka_error_code(),
        Some(
            RDKafkaErrorCode::Fatal
                | RDKafkaErrorCode::Authentication
                | RDKafkaErrorCode::SaslAuthenticationFailed
                | RDKafkaErrorCode::TopicAuthorizationFailed
                | RDKafkaErrorCode::GroupAuthorizationFailed
                | RDKafkaErrorCode::ClusterAuthorizationFailed
        )
    ) || matches!(
        error,
        KafkaError::ClientCreation(_) | KafkaError::Subscription(_)
    );

    if fatal {
        ContractError::source_connection(error.to_string())
    } else {
        ContractError::source_poll(error.to_string())
    }
}

impl MessageSource for KafkaSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self) -> Option<Result<Message, ContractError>> {
        Some(match self.consumer.recv().await {
            Ok(record) => Ok(to_message(&record)),
            Err(e) => Err(classify(e)),
        })
    }

    fn commit(
        &mut self,
        topic: &str,
        partition: i32,
        next_offset: i64,
    ) -> Result<(), ContractError> {
        let commit_error = |message: String| ContractError::OffsetCommit {
            topic: topic.to_string(),
            partition,
            message,
        };

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(next_offset))
            .map_err(|e| commit_error(e.to_string()))?;
        self.committed.insert((topic.to_string(), partition), next_offset);
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| commit_error(e.to_string()))
    }

    fn flush_commits(&mut self) -> Result<(), ContractError> {
        if self.committed.is_empty() {
            return Ok(());
        }
        let flush_error =
            |e: KafkaError| ContractError::Other(format!("final offset commit failed: {e}"));

        let tpl = watermark_list(&self.committed).map_err(flush_error)?;
        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(flush_error)?;
        debug!(partitions = self.committed.len(), "Final offsets committed");
        Ok(())
    }
}
