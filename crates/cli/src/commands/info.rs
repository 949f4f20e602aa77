//! `info` command implementation.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use contracts::RelayBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Debug, Serialize)]
struct ConfigInfo {
    version: String,
    kafka: KafkaInfo,
    relay: RelayInfo,
    /// Environment keys that overrode the file
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env_overrides: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct KafkaInfo {
    brokers: Vec<String>,
    group_id: String,
    source_topic: String,
    destination_topic: String,
    auto_offset_reset: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    consumer_properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    producer_properties: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct RelayInfo {
    channel_capacity: usize,
    max_in_flight: usize,
    drain_timeout_ms: u64,
    delivery_timeout_ms: u64,
    offset_policy: String,
    observer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dead_letter_topic: Option<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let info = load_config_info(&args.config, |key| std::env::var(key).ok())?;
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

/// Load the file, apply environment overrides, then validate
fn load_config_info<F>(path: &Path, lookup: F) -> Result<ConfigInfo>
where
    F: Fn(&str) -> Option<String>,
{
    let (blueprint, env_overrides) = config_loader::ConfigLoader::load_with_lookup(path, lookup)
        .map_err(CliError::from)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok(build_config_info(&blueprint, env_overrides))
}

fn build_config_info(blueprint: &RelayBlueprint, env_overrides: Vec<&'static str>) -> ConfigInfo {
    let kafka = &blueprint.kafka;
    let relay = &blueprint.relay;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        kafka: KafkaInfo {
            brokers: kafka
                .brokers
                .split(',')
                .map(|b| b.trim().to_string())
                .collect(),
            group_id: kafka.group_id.clone(),
            source_topic: kafka.source_topic.clone(),
            destination_topic: kafka.destination_topic.clone(),
            auto_offset_reset: kafka.auto_offset_reset.as_str(),
            consumer_properties: kafka.consumer_properties.clone().into_iter().collect(),
            producer_properties: kafka.producer_properties.clone().into_iter().collect(),
        },
        relay: RelayInfo {
            channel_capacity: relay.channel_capacity,
            max_in_flight: relay.max_in_flight,
            drain_timeout_ms: relay.drain_timeout_ms,
            delivery_timeout_ms: relay.delivery_timeout_ms,
            offset_policy: format!("{:?}", relay.offset_policy),
            observer: format!("{:?}", relay.observer),
            dead_letter_topic: relay.dead_letter_topic.clone(),
        },
        env_overrides,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Topic Relay Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let kafka = &info.kafka;
    println!("📡 Kafka");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ Brokers: {}", kafka.brokers.join(", "));
    println!("   ├─ Group: {}", kafka.group_id);
    println!("   ├─ Source: {}", kafka.source_topic);
    println!("   ├─ Destination: {}", kafka.destination_topic);
    println!("   └─ Auto offset reset: {}", kafka.auto_offset_reset);

    for (title, props) in [
        ("Consumer properties", &kafka.consumer_properties),
        ("Producer properties", &kafka.producer_properties),
    ] {
        if props.is_empty() {
            continue;
        }
        println!("\n🔧 {} ({})", title, props.len());
        for (i, (key, value)) in props.iter().enumerate() {
            let prefix = if i == props.len() - 1 { "└─" } else { "├─" };
            println!("   {} {} = {}", prefix, key, value);
        }
    }

    let relay = &info.relay;
    println!("\n⚙️  Relay");
    println!("   ├─ Channel capacity: {}", relay.channel_capacity);
    println!("   ├─ Max in-flight: {}", relay.max_in_flight);
    println!("   ├─ Drain timeout: {} ms", relay.drain_timeout_ms);
    println!("   ├─ Delivery timeout: {} ms", relay.delivery_timeout_ms);
    println!("   ├─ Offset policy: {}", relay.offset_policy);
    println!("   ├─ Observer: {}", relay.observer);
    match &relay.dead_letter_topic {
        Some(topic) => println!("   └─ Dead-letter topic: {}", topic),
        None => println!("   └─ Dead-letter topic: (log only)"),
    }

    if !info.env_overrides.is_empty() {
        println!("\n🌱 Environment overrides: {}", info.env_overrides.join(", "));
    }

    println!();
}
