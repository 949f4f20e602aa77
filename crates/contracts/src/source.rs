//! MessageSource trait - broker consumer abstraction
//!
//! Decouples the source loop (error policy, channel push, offset commit)
//! from the concrete consumer, so Kafka and scripted sources share one runner.

use crate::{ContractError, Message};

/// Consumer side of the relay
#[trait_variant::make(MessageSource: Send)]
pub trait LocalMessageSource {
    /// Source name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Wait for the next record
    ///
    /// - `Some(Ok(msg))`: a record was received
    /// - `Some(Err(e))`: the attempt failed; `e.is_fatal()` decides whether
    ///   the runner keeps polling
    /// - `None`: the stream has ended
    async fn poll(&mut self) -> Option<Result<Message, ContractError>>;

    /// Commit `next_offset` (the offset of the next record to read) for a
    /// topic partition
    fn commit(&mut self, topic: &str, partition: i32, next_offset: i64)
        -> Result<(), ContractError>;

    /// Make every commit issued so far durable
    ///
    /// Called once after the last `commit`, before the source is dropped.
    /// `commit` may be asynchronous; this must not return until the broker
    /// has the final positions.
    fn flush_commits(&mut self) -> Result<(), ContractError>;
}
