//! Dispatch Coordinator - owns one run from source to report

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    CampaignMetadata, DeliveryTransport, DispatchOutcome, DispatchReport, DispatchSettings,
    MessageRenderer, RecipientSource,
};
use ingestion::{dispatch_channel, produce, ProducerSummary};
use observability::metrics::{record_queue_depth, record_workers_active};
use observability::DeliveryStatsAggregator;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatchError;
use crate::worker::{Worker, WorkerShared, WorkerStats};

/// Run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Number of workers, must be > 0
    pub worker_count: usize,
    /// Dispatch channel buffer; 0 means synchronous handoff to a waiting worker
    pub channel_capacity: usize,
    /// Delay after every attempt, per worker
    pub pace_delay: Duration,
    /// Cancel the run after this long
    pub timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            channel_capacity: 0,
            pace_delay: Duration::ZERO,
            timeout: None,
        }
    }
}

impl From<&DispatchSettings> for DispatchConfig {
    fn from(settings: &DispatchSettings) -> Self {
        Self {
            worker_count: settings.worker_count,
            channel_capacity: settings.channel_capacity,
            pace_delay: settings.pace_delay(),
            timeout: settings.timeout(),
        }
    }
}

/// Runs the producer and the worker pool, aggregates the outcomes
pub struct DispatchCoordinator<R, T> {
    config: DispatchConfig,
    campaign: Arc<CampaignMetadata>,
    renderer: Arc<R>,
    transport: Arc<T>,
    cancel: CancellationToken,
}

impl<R, T> DispatchCoordinator<R, T>
where
    R: MessageRenderer + 'static,
    T: DeliveryTransport + Sync + 'static,
{
    pub fn new(
        config: DispatchConfig,
        campaign: Arc<CampaignMetadata>,
        renderer: Arc<R>,
        transport: Arc<T>,
    ) -> Self {
        Self {
            config,
            campaign,
            renderer,
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that cancels the run (signal handlers, tests)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Dispatch every recipient of `source`
    ///
    /// Returns once the producer and every worker have stopped. Per-message
    /// failures are in the report; the only error is a rejected config.
    #[instrument(
        name = "dispatch_run",
        skip(self, source),
        fields(
            workers = self.config.worker_count,
            capacity = self.config.channel_capacity,
            source = %source.locator()
        )
    )]
    pub async fn run<S>(&self, source: S) -> Result<DispatchReport, DispatchError>
    where
        S: RecipientSource + 'static,
    {
        if self.config.worker_count == 0 {
            return Err(DispatchError::InvalidConfig(
                "worker_count must be greater than 0".to_string(),
            ));
        }

        let started = Instant::now();
        let run_cancel = self.cancel.child_token();
        let timer = self.spawn_timeout(&run_cancel);

        let (tx, rx) = dispatch_channel(self.config.channel_capacity);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<DispatchOutcome>();

        let shared = Arc::new(WorkerShared {
            campaign: Arc::clone(&self.campaign),
            renderer: Arc::clone(&self.renderer),
            transport: Arc::clone(&self.transport),
            pace_delay: self.config.pace_delay,
            cancel: run_cancel.clone(),
            active: AtomicUsize::new(self.config.worker_count),
        });

        record_workers_active(self.config.worker_count);
        let workers: Vec<JoinHandle<WorkerStats>> = (0..self.config.worker_count)
            .map(|id| {
                let worker = Worker::new(id, rx.clone(), outcome_tx.clone(), Arc::clone(&shared));
                tokio::spawn(worker.run())
            })
            .collect();
        // outcome channel closes once every worker is gone
        drop(outcome_tx);

        let producer = tokio::spawn(produce(source, tx, run_cancel.clone()));

        info!(
            workers = self.config.worker_count,
            transport = self.transport.name(),
            "dispatch started"
        );

        let mut report = DispatchReport::default();
        let mut stats = DeliveryStatsAggregator::new();
        while let Some(outcome) = outcome_rx.recv().await {
            stats.update(&outcome);
            report.record(outcome);
        }

        let cancelled = run_cancel.is_cancelled();
        if !cancelled && !rx.is_closed() {
            // every worker died while the producer was still feeding
            warn!("all workers exited before the source was exhausted, stopping producer");
            rx.close();
        }

        Self::join_workers(workers).await;
        let summary = Self::join_producer(producer).await;

        // enqueued but never picked up
        while let Ok(recipient) = rx.try_recv() {
            report.record_skipped(recipient);
        }
        record_queue_depth(0);
        for recipient in summary.skipped {
            report.record_skipped(recipient);
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        report.malformed_count = summary.malformed;
        report.source_error = summary.source_error.map(|e| e.to_string());
        report.cancelled = cancelled || summary.cancelled;
        report.send_latency = stats.latency();
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            sent = report.sent_count,
            failed = report.failed_count,
            skipped = report.skipped_count,
            malformed = report.malformed_count,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "dispatch finished"
        );
        debug!("\n{}", stats.summary());

        Ok(report)
    }

    fn spawn_timeout(&self, run_cancel: &CancellationToken) -> Option<JoinHandle<()>> {
        let timeout = self.config.timeout?;
        let cancel = run_cancel.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "run timed out, cancelling");
                    cancel.cancel();
                }
            }
        }))
    }

    async fn join_workers(workers: Vec<JoinHandle<WorkerStats>>) {
        for (id, handle) in workers.into_iter().enumerate() {
            match handle.await {
                Ok(stats) => debug!(worker_id = id, processed = stats.processed, "worker joined"),
                Err(e) => error!(worker_id = id, error = %e, "Worker task panicked"),
            }
        }
    }

    async fn join_producer(producer: JoinHandle<ProducerSummary>) -> ProducerSummary {
        match producer.await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "Producer task panicked");
                ProducerSummary::default()
            }
        }
    }
}
