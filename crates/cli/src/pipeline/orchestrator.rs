//! Pipeline orchestrator - wires configuration into a dispatch run.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{CampaignBlueprint, DispatchReport, TransportType};
use dispatcher::{build_transport, DispatchConfig, DispatchCoordinator};
use ingestion::{CsvOptions, CsvRecipientSource};
use renderer::TemplateRenderer;
use tracing::{info, warn};

use crate::error::CliError;

/// Command-line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub recipients: Option<PathBuf>,
    pub workers: Option<usize>,
    pub capacity: Option<usize>,
    pub pace_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub transport: Option<TransportType>,
    /// Forces the log transport
    pub dry_run: bool,
}

impl RunOverrides {
    pub fn apply(&self, blueprint: &mut CampaignBlueprint) {
        if let Some(ref path) = self.recipients {
            info!(path = %path.display(), "Overriding recipient source from CLI");
            blueprint.source.path = path.clone();
        }
        if let Some(workers) = self.workers {
            info!(workers, "Overriding worker count from CLI");
            blueprint.dispatch.worker_count = workers;
        }
        if let Some(capacity) = self.capacity {
            blueprint.dispatch.channel_capacity = capacity;
        }
        if let Some(pace_ms) = self.pace_ms {
            blueprint.dispatch.pace_delay_ms = pace_ms;
        }
        if let Some(timeout) = self.timeout_secs {
            blueprint.dispatch.timeout_secs = timeout;
        }
        if let Some(transport) = self.transport {
            info!(transport = transport.as_str(), "Overriding transport from CLI");
            blueprint.transport.transport_type = transport;
        }
        if self.dry_run {
            info!("Dry run mode - messages are logged, not delivered");
            blueprint.transport.transport_type = TransportType::Log;
        }
    }
}

/// Main pipeline orchestrator
pub struct Pipeline {
    blueprint: CampaignBlueprint,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(blueprint: CampaignBlueprint) -> Self {
        Self { blueprint }
    }

    /// Run the campaign to completion
    ///
    /// `shutdown` resolving cancels the run; the report is still returned.
    pub async fn run<F>(self, shutdown: F) -> Result<DispatchReport>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let blueprint = &self.blueprint;

        let campaign = blueprint
            .to_campaign_metadata()
            .context("Failed to build campaign")?;
        let renderer = TemplateRenderer::new(&campaign).context("Invalid message template")?;
        let transport =
            build_transport(&blueprint.transport).context("Failed to set up transport")?;

        let source = CsvRecipientSource::open(
            &blueprint.source.path,
            CsvOptions {
                has_header: blueprint.source.has_header,
            },
        )
        .await
        .map_err(|e| CliError::source_unavailable(e.to_string()))?;

        let config = DispatchConfig::from(&blueprint.dispatch);
        info!(
            source = %blueprint.source.path.display(),
            workers = config.worker_count,
            capacity = config.channel_capacity,
            pace_ms = config.pace_delay.as_millis() as u64,
            transport = blueprint.transport.transport_type.as_str(),
            "Starting dispatch"
        );

        let coordinator = DispatchCoordinator::new(
            config,
            Arc::new(campaign),
            Arc::new(renderer),
            Arc::new(transport),
        );

        let cancel = coordinator.cancellation_token();
        let shutdown_task = tokio::spawn(async move {
            shutdown.await;
            warn!("Received shutdown signal, stopping dispatch...");
            cancel.cancel();
        });

        let result = coordinator.run(source).await;
        shutdown_task.abort();

        result.context("Dispatch run failed")
    }
}
