//! Prometheus metric names
//!
//! Recorded by `ingestion` and `dispatcher`, described by `observability`.

/// Messages received from the source topic
pub const MESSAGES_RECEIVED_TOTAL: &str = "topic_relay_messages_received_total";
/// Messages acknowledged by the destination topic
pub const MESSAGES_PUBLISHED_TOTAL: &str = "topic_relay_messages_published_total";
/// Publishes handed to the error sink
pub const PUBLISH_FAILURES_TOTAL: &str = "topic_relay_publish_failures_total";
/// Recoverable source poll errors
pub const SOURCE_POLL_ERRORS_TOTAL: &str = "topic_relay_source_poll_errors_total";
/// Outstanding publish tasks
pub const PUBLISH_IN_FLIGHT: &str = "topic_relay_publish_in_flight";
/// Publish start to broker acknowledgment
pub const PUBLISH_LATENCY_MS: &str = "topic_relay_publish_latency_ms";
