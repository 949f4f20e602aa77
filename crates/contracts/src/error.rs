//! Layered error definitions
//!
//! Categorized by source: config / source / publish

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Source Errors =====
    /// Source cannot reach or keep its subscription (fatal)
    #[error("source connection error: {message}")]
    SourceConnection { message: String },

    /// A single poll attempt failed (recoverable)
    #[error("source poll error: {message}")]
    SourcePoll { message: String },

    /// Offset commit failed
    #[error("offset commit error for {topic}[{partition}]: {message}")]
    OffsetCommit {
        topic: String,
        partition: i32,
        message: String,
    },

    // ===== Sink Errors =====
    /// A single publish attempt failed (recoverable, per message)
    #[error("publish to '{topic}' failed: {message}")]
    Publish { topic: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create fatal source connection error
    pub fn source_connection(message: impl Into<String>) -> Self {
        Self::SourceConnection {
            message: message.into(),
        }
    }

    /// Create recoverable source poll error
    pub fn source_poll(message: impl Into<String>) -> Self {
        Self::SourcePoll {
            message: message.into(),
        }
    }

    /// Create publish error
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Whether this error must terminate the relay pipeline
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceConnection { .. }
                | Self::ConfigParse { .. }
                | Self::ConfigValidation { .. }
        )
    }
}
