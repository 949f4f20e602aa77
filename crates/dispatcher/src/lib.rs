//! # Dispatcher
//!
//! 消息分发模块。
//!
//! 负责：
//! - 消费 source 通道中的 `Message`
//! - 为每条消息启动独立的发布任务（受 `max_in_flight` 限制）
//! - 按到达顺序把 payload 交给本地 observer
//! - 发布失败交给 `ErrorSink`，不阻塞主链路
//! - 关闭时等待（或超时中止）所有在途发布

pub mod dispatcher;
pub mod error;
pub mod error_sinks;
pub mod metrics;
pub mod observers;
pub mod pool;
pub mod sinks;

pub use contracts::{ErrorSink, Message, MessageSink, Observer};
pub use dispatcher::{
    DispatchReport, Dispatcher, DispatcherConfig, DispatcherState, StateHandle,
};
pub use error::DispatcherError;
pub use error_sinks::{DeadLetterSink, LogErrorSink};
pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use observers::{observer_for, LogObserver, NullObserver, StdoutObserver};
pub use pool::{DrainSummary, PublishPool};
#[cfg(feature = "kafka")]
pub use sinks::{producer_config, KafkaSink};
pub use sinks::LogSink;
