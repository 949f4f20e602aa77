//! Environment overrides
//!
//! Keys follow the `.env` layout used by existing deployments of the relay.

use contracts::RelayBlueprint;

/// Bootstrap servers
pub const ENV_BROKERS: &str = "KafkaBootstrapServers";
/// Consumer group id
pub const ENV_GROUP_ID: &str = "KafkaConsumerGroupId";
/// Topic consumed from
pub const ENV_SOURCE_TOPIC: &str = "KafkaReadTopic";
/// Topic republished to
pub const ENV_DESTINATION_TOPIC: &str = "KafkaProduceTopic";
/// Dead-letter topic
pub const ENV_DEAD_LETTER_TOPIC: &str = "KafkaDeadLetterTopic";

/// Apply overrides from the process environment
///
/// Returns the names of the keys that were applied.
pub fn apply_env_overrides(blueprint: &mut RelayBlueprint) -> Vec<&'static str> {
    apply_overrides(blueprint, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary lookup
///
/// Empty values are ignored.
pub fn apply_overrides<F>(blueprint: &mut RelayBlueprint, lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();
    let mut get = |key: &'static str| {
        let value = lookup(key).filter(|v| !v.trim().is_empty())?;
        applied.push(key);
        Some(value)
    };

    if let Some(v) = get(ENV_BROKERS) {
        blueprint.kafka.brokers = v;
    }
    if let Some(v) = get(ENV_GROUP_ID) {
        blueprint.kafka.group_id = v;
    }
    if let Some(v) = get(ENV_SOURCE_TOPIC) {
        blueprint.kafka.source_topic = v;
    }
    if let Some(v) = get(ENV_DESTINATION_TOPIC) {
        blueprint.kafka.destination_topic = v;
    }
    if let Some(v) = get(ENV_DEAD_LETTER_TOPIC) {
        blueprint.relay.dead_letter_topic = Some(v);
    }

    applied
}
