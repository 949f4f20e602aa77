//! Configuration validation
//!
//! Rules:
//! - field-level checks declared on the contract types (non-empty, > 0)
//! - source_topic != destination_topic
//! - dead_letter_topic differs from both relay topics
//! - broker list has no empty entries

use contracts::{ContractError, RelayBlueprint};
use validator::Validate;

/// Validate a RelayBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_brokers(blueprint)?;
    validate_topics(blueprint)?;
    Ok(())
}

/// Field-level rules from `#[validate(..)]` attributes
fn validate_fields(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// Every comma separated broker entry must be non-empty
fn validate_brokers(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    for (idx, broker) in blueprint.kafka.brokers.split(',').enumerate() {
        if broker.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("kafka.brokers[{idx}]"),
                "empty broker address",
            ));
        }
    }
    Ok(())
}

/// Relaying a topic onto itself would loop forever
fn validate_topics(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let kafka = &blueprint.kafka;

    if kafka.source_topic == kafka.destination_topic {
        return Err(ContractError::config_validation(
            "kafka.destination_topic",
            format!(
                "destination_topic must differ from source_topic ('{}')",
                kafka.source_topic
            ),
        ));
    }

    if let Some(ref dlq) = blueprint.relay.dead_letter_topic {
        if dlq.is_empty() {
            return Err(ContractError::config_validation(
                "relay.dead_letter_topic",
                "dead_letter_topic cannot be empty",
            ));
        }
        if dlq == &kafka.source_topic || dlq == &kafka.destination_topic {
            return Err(ContractError::config_validation(
                "relay.dead_letter_topic",
                format!("dead_letter_topic '{dlq}' must differ from the relay topics"),
            ));
        }
    }

    Ok(())
}
