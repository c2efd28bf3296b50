//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::TransportType;
use std::path::PathBuf;

/// Mailcast - bulk email dispatch with a bounded worker pool
#[derive(Parser, Debug)]
#[command(
    name = "mailcast",
    author,
    version,
    about = "Bulk email dispatch pipeline",
    long_about = "Reads recipients from a CSV file, renders a personalized message for \n\
                  each one and delivers them through a fixed pool of concurrent workers.\n\n\
                  Failed deliveries never stop the run; they are reported at the end \n\
                  and can be written to a retry list."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MAILCAST_VERBOSE")]
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
        env = "MAILCAST_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch a campaign
    Run(RunArgs),

    /// Validate configuration file without sending anything
    Validate(ValidateArgs),

    /// Display the resolved campaign configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to campaign configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "campaign.toml",
        env = "MAILCAST_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the recipient CSV path from configuration
    #[arg(long, env = "MAILCAST_RECIPIENTS")]
    pub recipients: Option<PathBuf>,

    /// Override the number of workers
    #[arg(long, env = "MAILCAST_WORKERS")]
    pub workers: Option<usize>,

    /// Override the dispatch channel capacity
    #[arg(long, env = "MAILCAST_CAPACITY")]
    pub capacity: Option<usize>,

    /// Override the per-worker pacing delay in milliseconds
    #[arg(long, env = "MAILCAST_PACE_MS")]
    pub pace_ms: Option<u64>,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, env = "MAILCAST_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Override the transport type
    #[arg(long, value_enum, env = "MAILCAST_TRANSPORT")]
    pub transport: Option<TransportArg>,

    /// Render and log every message without delivering it
    #[arg(long)]
    pub dry_run: bool,

    /// Write the full dispatch report as JSON
    #[arg(long, env = "MAILCAST_REPORT")]
    pub report: Option<PathBuf>,

    /// Write failed and skipped recipients as CSV for a later retry
    #[arg(long, env = "MAILCAST_RETRY_OUT")]
    pub retry_out: Option<PathBuf>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "MAILCAST_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "campaign.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "campaign.toml")]
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

/// Transport selectable on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportArg {
    Log,
    File,
    Smtp,
}

impl From<TransportArg> for TransportType {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Log => Self::Log,
            TransportArg::File => Self::File,
            TransportArg::Smtp => Self::Smtp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::parse_from([
            "mailcast",
            "-v",
            "run",
            "-c",
            "c.toml",
            "--workers",
            "3",
            "--transport",
            "file",
            "--retry-out",
            "retry.csv",
        ]);
        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("c.toml"));
        assert_eq!(args.workers, Some(3));
        assert_eq!(args.transport, Some(TransportArg::File));
        assert_eq!(args.retry_out, Some(PathBuf::from("retry.csv")));
        assert!(!args.dry_run);
    }
}
