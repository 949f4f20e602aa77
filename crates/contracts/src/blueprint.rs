//! RelayBlueprint - Config Loader output
//!
//! Describes the complete relay configuration: broker connection, topics,
//! dispatcher tuning and offset policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete relay blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Broker connection and topics
    #[validate(nested)]
    pub kafka: KafkaConfig,

    /// Dispatcher tuning
    #[serde(default)]
    #[validate(nested)]
    pub relay: RelayConfig,
}

/// Broker connection and topic configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KafkaConfig {
    /// Bootstrap servers (comma separated)
    #[serde(default = "default_brokers")]
    #[validate(length(min = 1, message = "brokers cannot be empty"))]
    pub brokers: String,

    /// Consumer group id
    #[validate(length(min = 1, message = "group_id cannot be empty"))]
    pub group_id: String,

    /// Topic consumed from
    #[validate(length(min = 1, message = "source_topic cannot be empty"))]
    pub source_topic: String,

    /// Topic republished to
    #[validate(length(min = 1, message = "destination_topic cannot be empty"))]
    pub destination_topic: String,

    /// Where a new consumer group starts reading
    #[serde(default)]
    pub auto_offset_reset: AutoOffsetReset,

    /// Extra librdkafka consumer properties
    #[serde(default)]
    pub consumer_properties: HashMap<String, String>,

    /// Extra librdkafka producer properties
    #[serde(default)]
    pub producer_properties: HashMap<String, String>,
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

/// `auto.offset.reset` values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoOffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl AutoOffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

/// Dispatcher tuning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    /// Source -> Dispatcher channel capacity
    #[serde(default = "default_channel_capacity")]
    #[validate(range(min = 1, message = "channel_capacity must be > 0"))]
    pub channel_capacity: usize,

    /// Maximum outstanding publish tasks
    #[serde(default = "default_max_in_flight")]
    #[validate(range(min = 1, message = "max_in_flight must be > 0"))]
    pub max_in_flight: usize,

    /// How long shutdown waits for in-flight publishes (ms)
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Producer delivery timeout (ms)
    #[serde(default = "default_delivery_timeout_ms")]
    #[validate(range(min = 1, message = "delivery_timeout_ms must be > 0"))]
    pub delivery_timeout_ms: u64,

    /// When consumed offsets are committed
    #[serde(default)]
    pub offset_policy: OffsetPolicy,

    /// Local observer for relayed payloads
    #[serde(default)]
    pub observer: ObserverKind,

    /// Failed publishes are republished here when set
    #[serde(default)]
    pub dead_letter_topic: Option<String>,
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_max_in_flight() -> usize {
    1024
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_delivery_timeout_ms() -> u64 {
    5000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_in_flight: default_max_in_flight(),
            drain_timeout_ms: default_drain_timeout_ms(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            offset_policy: OffsetPolicy::default(),
            observer: ObserverKind::default(),
            dead_letter_topic: None,
        }
    }
}

/// Offset commit policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetPolicy {
    /// Broker auto-commit on a timer, independent of publish outcome
    #[default]
    Auto,
    /// Commit an offset once it and every earlier offset of its partition
    /// has a settled publish outcome
    AfterPublish,
}

/// Local observer selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverKind {
    /// Print payload text to stdout
    #[default]
    Stdout,
    /// Emit payload through tracing
    Log,
    /// Disabled
    None,
}
