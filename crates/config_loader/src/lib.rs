//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Apply environment overrides
//! - Validate configuration legality
//! - Produce a `RelayBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("relay.toml")).unwrap();
//! println!("{} -> {}", blueprint.kafka.source_topic, blueprint.kafka.destination_topic);
//! ```

mod env;
mod parser;
mod validator;

pub use contracts::RelayBlueprint;
pub use env::{
    apply_env_overrides, apply_overrides, ENV_BROKERS, ENV_DEAD_LETTER_TOPIC,
    ENV_DESTINATION_TOPIC, ENV_GROUP_ID, ENV_SOURCE_TOPIC,
};
pub use parser::ConfigFormat;
pub use validator::validate;

use contracts::{AutoOffsetReset, ConfigVersion, ContractError, KafkaConfig, RelayConfig};
use std::collections::HashMap;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RelayBlueprint, ContractError> {
        let blueprint = Self::parse_path(path)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Load configuration from file path, then apply environment overrides
    /// before validating
    pub fn load_with_env(path: &Path) -> Result<RelayBlueprint, ContractError> {
        Self::load_with_lookup(path, |key| std::env::var(key).ok()).map(|(blueprint, _)| blueprint)
    }

    /// Load configuration from file path, apply overrides from `lookup`,
    /// then validate
    ///
    /// Returns the blueprint together with the override keys that were applied.
    pub fn load_with_lookup<F>(
        path: &Path,
        lookup: F,
    ) -> Result<(RelayBlueprint, Vec<&'static str>), ContractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut blueprint = Self::parse_path(path)?;
        let applied = env::apply_overrides(&mut blueprint, lookup);
        validator::validate(&blueprint)?;
        Ok((blueprint, applied))
    }

    /// Load a blueprint that still needs validation
    ///
    /// Parses `path` when given, otherwise starts from an empty skeleton so
    /// the relay can be configured from the environment alone. Environment
    /// overrides are applied in both cases. Callers layer their own
    /// overrides on top and then call [`validate`].
    pub fn load_draft(path: Option<&Path>) -> Result<RelayBlueprint, ContractError> {
        let mut blueprint = match path {
            Some(path) => Self::parse_path(path)?,
            None => empty_blueprint(),
        };
        env::apply_env_overrides(&mut blueprint);
        Ok(blueprint)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RelayBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Serialize RelayBlueprint to TOML string
    pub fn to_toml(blueprint: &RelayBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Toml)
    }

    /// Serialize RelayBlueprint to JSON string
    pub fn to_json(blueprint: &RelayBlueprint) -> Result<String, ContractError> {
        parser::render(blueprint, ConfigFormat::Json)
    }

    fn parse_path(path: &Path) -> Result<RelayBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        parser::parse(&content, format)
    }
}

fn empty_blueprint() -> RelayBlueprint {
    RelayBlueprint {
        version: ConfigVersion::default(),
        kafka: KafkaConfig {
            brokers: "localhost:9092".to_string(),
            group_id: String::new(),
            source_topic: String::new(),
            destination_topic: String::new(),
            auto_offset_reset: AutoOffsetReset::default(),
            consumer_properties: HashMap::new(),
            producer_properties: HashMap::new(),
        },
        relay: RelayConfig::default(),
    }
}
