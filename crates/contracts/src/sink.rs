//! MessageSink / ErrorSink traits - Dispatcher output interfaces

use crate::{Ack, ContractError, Message, PublishFailure};

/// Publish interface
///
/// Implementations are invoked concurrently from many publish tasks, so
/// they take `&self` and keep any mutable state behind a thread-safe client.
#[trait_variant::make(MessageSink: Send)]
pub trait LocalMessageSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Destination topic
    fn topic(&self) -> &str;

    /// Publish one message to the destination topic, routed by its key
    ///
    /// # Errors
    /// Returns `ContractError::Publish`; the caller decides what to do with it.
    async fn publish(&self, message: Message) -> Result<Ack, ContractError>;
}

/// Destination for failed publishes
///
/// Receives every `PublishFailure` produced by the publish pool.
#[trait_variant::make(ErrorSink: Send)]
pub trait LocalErrorSink {
    /// Error sink name (used for logging)
    fn name(&self) -> &str;

    /// Report one failed publish. Must not panic.
    async fn report(&self, failure: PublishFailure);
}
