//! Sink implementations
//!
//! Contains KafkaSink (feature `kafka`) and LogSink.

#[cfg(feature = "kafka")]
mod kafka;
mod log;

#[cfg(feature = "kafka")]
pub use self::kafka::{producer_config, KafkaSink};
pub use self::log::LogSink;
