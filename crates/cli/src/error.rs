//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration load or validation error
    #[error("Invalid configuration")]
    Config(#[from] contracts::ContractError),

    /// Sink could not be created
    #[error("Failed to set up relay")]
    Setup(#[from] dispatcher::DispatcherError),

    /// Source ended with an unrecoverable error
    #[error("Relay stopped")]
    SourceFailed(#[from] ingestion::IngestionError),

    /// Dispatcher task panicked or was cancelled
    #[error("Dispatcher task failed")]
    DispatcherTask(#[from] tokio::task::JoinError),
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_printed_once_in_chain() {
        let err = anyhow::Error::from(CliError::from(contracts::ContractError::config_validation(
            "kafka.brokers[0]",
            "empty broker address",
        )));

        assert_eq!(err.to_string(), "Invalid configuration");
        let chain = format!("{err:#}");
        assert_eq!(chain.matches("empty broker address").count(), 1, "{chain}");
    }
}
