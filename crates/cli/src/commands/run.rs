//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{print_report, write_report_json, write_retry_csv, Pipeline, RunOverrides};

/// Execute the `run` command
pub async fn run_campaign(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let overrides = RunOverrides {
        recipients: args.recipients.clone(),
        workers: args.workers,
        capacity: args.capacity,
        pace_ms: args.pace_ms,
        timeout_secs: args.timeout,
        transport: args.transport.map(Into::into),
        dry_run: args.dry_run,
    };
    overrides.apply(&mut blueprint);

    info!(
        from = %blueprint.campaign.from,
        subject = %blueprint.campaign.subject,
        source = %blueprint.source.path.display(),
        transport = blueprint.transport.transport_type.as_str(),
        "Configuration loaded"
    );

    let report = Pipeline::new(blueprint).run(setup_shutdown_signal()).await?;

    print_report(&report);

    if let Some(ref path) = args.report {
        write_report_json(&report, path)?;
        info!(path = %path.display(), "Report written");
    }
    if let Some(ref path) = args.retry_out {
        let rows = write_retry_csv(&report, path)?;
        info!(path = %path.display(), rows, "Retry list written");
    }

    match CliError::from_report(&report) {
        Some(err) => Err(err.into()),
        None => {
            info!("Mailcast finished");
            Ok(())
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
