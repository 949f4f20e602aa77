//! Relay orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{MockSettings, Pipeline, PipelineConfig};
pub use stats::RelayStats;
