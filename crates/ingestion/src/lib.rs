//! # Ingestion
//!
//! 消息源模块。
//!
//! Responsibilities:
//! - Poll a `MessageSource` (Kafka or scripted mock) in a background task
//! - Push each record onto the relay channel in broker order
//! - Log and retry recoverable poll errors, stop on fatal ones
//! - Commit offsets according to the configured `OffsetPolicy`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{KafkaSource, SourceConfig, SourceRunner};
//!
//! let source = KafkaSource::connect(&blueprint.kafka, policy)?;
//! let (handle, rx) = SourceRunner::new(source, SourceConfig::default()).spawn();
//! // ... hand `rx` to the dispatcher ...
//! let exit = handle.join().await;
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::MockSource;
//!
//! let source = MockSource::from_payloads("in", &["a", "b"]);
//! ```

mod config;
mod error;
#[cfg(feature = "kafka")]
mod kafka;
mod mock;
mod offsets;
mod runner;

// Re-exports
pub use config::{IngestionMetrics, MetricsSnapshot, OffsetPolicy, SourceConfig};
pub use contracts::Message;
pub use error::{CompletionReason, IngestionError, Result, SourceExit};
#[cfg(feature = "kafka")]
pub use kafka::{classify, consumer_config, to_message, KafkaSource};
pub use mock::{CommitLog, FlushLog, MockEvent, MockSource};
pub use offsets::OffsetTracker;
pub use runner::{SettlementSender, SourceHandle, SourceRunner};
