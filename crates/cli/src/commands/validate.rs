//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{OffsetPolicy, RelayBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    brokers: String,
    source_topic: String,
    destination_topic: String,
    group_id: String,
    offset_policy: OffsetPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    dead_letter_topic: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Same view of the configuration as `run`: file plus environment
    match config_loader::ConfigLoader::load_with_env(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    brokers: blueprint.kafka.brokers.clone(),
                    source_topic: blueprint.kafka.source_topic.clone(),
                    destination_topic: blueprint.kafka.destination_topic.clone(),
                    group_id: blueprint.kafka.group_id.clone(),
                    offset_policy: blueprint.relay.offset_policy,
                    dead_letter_topic: blueprint.relay.dead_letter_topic.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &RelayBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let relay = &blueprint.relay;

    if relay.offset_policy == OffsetPolicy::Auto {
        warnings.push(
            "offset_policy = auto: offsets may be committed before the publish succeeds"
                .to_string(),
        );
    }

    if relay.drain_timeout_ms == 0 {
        warnings.push("drain_timeout_ms = 0: shutdown waits for every publish".to_string());
    }

    if relay.dead_letter_topic.is_none() {
        warnings.push("no dead_letter_topic: failed publishes only appear in logs".to_string());
    }

    if relay.max_in_flight > relay.channel_capacity * 16 {
        warnings.push(format!(
            "max_in_flight ({}) is much larger than channel_capacity ({})",
            relay.max_in_flight, relay.channel_capacity
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Brokers: {}", summary.brokers);
            println!(
                "  Route: {} -> {}",
                summary.source_topic, summary.destination_topic
            );
            println!("  Group: {}", summary.group_id);
            println!("  Offset policy: {:?}", summary.offset_policy);
            if let Some(ref dlq) = summary.dead_letter_topic {
                println!("  Dead-letter topic: {}", dlq);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
