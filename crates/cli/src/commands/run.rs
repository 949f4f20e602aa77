//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info};

use contracts::RelayBlueprint;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{MockSettings, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    let config_path = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path).into());
            }
            info!(config = %path.display(), "Loading configuration");
            Some(path.as_path())
        }
        None => {
            info!("No configuration file, using environment and flags");
            None
        }
    };

    let mut blueprint = config_loader::ConfigLoader::load_draft(config_path)
        .map_err(CliError::from)
        .context("Failed to load configuration")?;

    apply_cli_overrides(&mut blueprint, args);
    if args.mock.is_some() {
        fill_mock_defaults(&mut blueprint);
    }
    config_loader::validate(&blueprint).map_err(CliError::from)?;

    info!(
        brokers = %blueprint.kafka.brokers,
        source = %blueprint.kafka.source_topic,
        destination = %blueprint.kafka.destination_topic,
        group_id = %blueprint.kafka.group_id,
        max_in_flight = blueprint.relay.max_in_flight,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
        mock: args.mock.map(|count| MockSettings {
            count,
            interval: Duration::from_millis(args.mock_interval_ms),
        }),
    });

    info!("Starting relay...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Relay execution failed")?;

    stats.print_summary();
    info!("Topic Relay finished");
    Ok(())
}

/// Flags win over file and environment
fn apply_cli_overrides(blueprint: &mut RelayBlueprint, args: &RunArgs) {
    if let Some(ref brokers) = args.brokers {
        info!(brokers = %brokers, "Overriding brokers from CLI");
        blueprint.kafka.brokers = brokers.clone();
    }
    if let Some(ref topic) = args.source_topic {
        blueprint.kafka.source_topic = topic.clone();
    }
    if let Some(ref topic) = args.destination_topic {
        blueprint.kafka.destination_topic = topic.clone();
    }
    if let Some(ref group_id) = args.group_id {
        blueprint.kafka.group_id = group_id.clone();
    }
    if let Some(policy) = args.offset_policy {
        blueprint.relay.offset_policy = policy.into();
    }
    if let Some(max_in_flight) = args.max_in_flight {
        blueprint.relay.max_in_flight = max_in_flight;
    }
}

/// Mock runs need no broker, so unset names get placeholders
fn fill_mock_defaults(blueprint: &mut RelayBlueprint) {
    let kafka = &mut blueprint.kafka;
    for (field, placeholder) in [
        (&mut kafka.group_id, "topic-relay-mock"),
        (&mut kafka.source_topic, "mock.in"),
        (&mut kafka.destination_topic, "mock.out"),
    ] {
        if field.is_empty() {
            *field = placeholder.to_string();
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
