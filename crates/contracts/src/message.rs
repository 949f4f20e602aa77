//! Message - Source output, Sink input
//!
//! Pass-through record shape carried across the relay.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Relayed message
///
/// Key, payload and headers are carried to the destination topic unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Partition routing key
    pub key: Option<Bytes>,

    /// Record value (`None` for tombstones)
    pub payload: Option<Bytes>,

    /// Record headers, in broker order (names may repeat)
    #[serde(default)]
    pub headers: Vec<Header>,

    /// Where the record was consumed from
    pub origin: RecordOrigin,
}

impl Message {
    /// Create a message with the given key and payload and no headers
    pub fn new(key: Option<Bytes>, payload: Option<Bytes>, origin: RecordOrigin) -> Self {
        Self {
            key,
            payload,
            headers: Vec::new(),
            origin,
        }
    }

    /// Attach a header (builder style)
    pub fn with_header(mut self, name: impl Into<String>, value: Option<Bytes>) -> Self {
        self.headers.push(Header {
            name: name.into(),
            value,
        });
        self
    }

    /// Payload length in bytes (0 for tombstones)
    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }

    /// Payload rendered as (lossy) UTF-8 text, for local observers
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Some(p) => String::from_utf8_lossy(p).into_owned(),
            None => String::new(),
        }
    }
}

/// Single record header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: Option<Bytes>,
}

/// Offset metadata of a consumed record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordOrigin {
    /// Source topic
    pub topic: String,

    /// Source partition
    pub partition: i32,

    /// Offset within the partition
    pub offset: i64,

    /// Broker/producer timestamp (ms since epoch), if any
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
}

impl RecordOrigin {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            timestamp_ms: None,
        }
    }
}

/// Broker acknowledgment for a published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Destination topic
    pub topic: String,

    /// Partition the message landed on
    pub partition: i32,

    /// Offset assigned by the broker
    pub offset: i64,
}

/// A message whose publish attempt failed, with the cause
#[derive(Debug)]
pub struct PublishFailure {
    pub message: Message,
    pub error: crate::ContractError,
}
