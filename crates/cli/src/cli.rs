//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::OffsetPolicy;
use std::path::PathBuf;

/// Topic Relay - consume one Kafka topic and republish it to another
#[derive(Parser, Debug)]
#[command(
    name = "topic-relay",
    author,
    version,
    about = "Kafka topic-to-topic relay",
    long_about = "Consumes every record from a source topic, republishes it unchanged \n\
                  (key, payload, headers) to a destination topic, and prints each \n\
                  payload locally as it passes through."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TOPIC_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TOPIC_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON). Optional: without it the
    /// relay is configured from the environment and the flags below.
    #[arg(short, long, env = "TOPIC_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override bootstrap servers
    #[arg(long)]
    pub brokers: Option<String>,

    /// Override the topic consumed from
    #[arg(long)]
    pub source_topic: Option<String>,

    /// Override the topic republished to
    #[arg(long)]
    pub destination_topic: Option<String>,

    /// Override the consumer group id
    #[arg(long)]
    pub group_id: Option<String>,

    /// Override when consumed offsets are committed
    #[arg(long, value_enum)]
    pub offset_policy: Option<OffsetPolicyArg>,

    /// Override the maximum number of outstanding publishes
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Run against a generated source of N messages and a log-only sink
    /// (no broker required)
    #[arg(long, value_name = "N")]
    pub mock: Option<usize>,

    /// Delay between generated mock messages in milliseconds
    #[arg(long, default_value = "10")]
    pub mock_interval_ms: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TOPIC_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Offset policy as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OffsetPolicyArg {
    /// Broker auto-commit
    Auto,
    /// Commit once publishes are settled
    AfterPublish,
}

impl From<OffsetPolicyArg> for OffsetPolicy {
    fn from(arg: OffsetPolicyArg) -> Self {
        match arg {
            OffsetPolicyArg::Auto => Self::Auto,
            OffsetPolicyArg::AfterPublish => Self::AfterPublish,
        }
    }
}
