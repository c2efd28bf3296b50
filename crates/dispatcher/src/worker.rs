//! Worker - receive, render, send, record

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    CampaignMetadata, DeliveryTransport, DispatchOutcome, MessageRenderer, OutcomeStatus,
    Recipient,
};
use ingestion::DispatchReceiver;
use observability::metrics::{record_outcome, record_workers_active};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

/// Per-worker lifecycle
///
/// `Idle -> Receiving -> Rendering -> Sending -> Recording -> Idle`;
/// a render failure goes straight from `Rendering` to `Recording`.
/// `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Receiving,
    Rendering,
    Sending,
    Recording,
    Done,
}

impl WorkerState {
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Idle, Receiving)
                | (Idle, Done)
                | (Receiving, Rendering)
                | (Receiving, Done)
                | (Rendering, Sending)
                | (Rendering, Recording)
                | (Sending, Recording)
                | (Recording, Idle)
        )
    }
}

/// Read-only state shared by every worker of a run
pub struct WorkerShared<R, T> {
    pub campaign: Arc<CampaignMetadata>,
    pub renderer: Arc<R>,
    pub transport: Arc<T>,
    pub pace_delay: Duration,
    pub cancel: CancellationToken,
    /// Workers still looping
    pub active: AtomicUsize,
}

/// What one worker did during the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub sent: u64,
    pub failed: u64,
}

/// A single pool worker
pub struct Worker<R, T> {
    id: usize,
    state: WorkerState,
    rx: DispatchReceiver,
    outcomes: mpsc::UnboundedSender<DispatchOutcome>,
    shared: Arc<WorkerShared<R, T>>,
}

impl<R, T> Worker<R, T>
where
    R: MessageRenderer + 'static,
    T: DeliveryTransport + Sync + 'static,
{
    pub fn new(
        id: usize,
        rx: DispatchReceiver,
        outcomes: mpsc::UnboundedSender<DispatchOutcome>,
        shared: Arc<WorkerShared<R, T>>,
    ) -> Self {
        Self {
            id,
            state: WorkerState::Idle,
            rx,
            outcomes,
            shared,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, next: WorkerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal worker transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(worker_id = self.id, from = ?self.state, to = ?next, "state");
        self.state = next;
    }

    /// Loop until the channel is closed and drained, or the run is cancelled
    ///
    /// A send that has started is never interrupted; cancellation is only
    /// observed while waiting for work or pacing.
    #[instrument(name = "worker_loop", skip(self), fields(worker_id = self.id))]
    pub async fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        debug!("worker started");

        loop {
            self.transition(WorkerState::Receiving);
            let recipient = tokio::select! {
                biased;
                _ = self.shared.cancel.cancelled() => break,
                received = self.rx.recv() => match received {
                    Ok(recipient) => recipient,
                    // closed and empty: normal completion
                    Err(_) => break,
                },
            };

            let outcome = self.attempt(recipient).await;

            self.transition(WorkerState::Recording);
            stats.processed += 1;
            match outcome.status {
                OutcomeStatus::Sent => stats.sent += 1,
                OutcomeStatus::Failed => stats.failed += 1,
            }
            record_outcome(&outcome);
            if self.outcomes.send(outcome).is_err() {
                warn!(worker_id = self.id, "outcome receiver dropped");
            }
            self.transition(WorkerState::Idle);

            if !self.shared.pace_delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.shared.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.shared.pace_delay) => {}
                }
            }
        }

        self.transition(WorkerState::Done);
        let remaining = self.shared.active.fetch_sub(1, Ordering::AcqRel) - 1;
        record_workers_active(remaining);
        debug!(
            processed = stats.processed,
            sent = stats.sent,
            failed = stats.failed,
            "worker stopped"
        );
        stats
    }

    /// Render then send one recipient; never fails, failures become outcomes
    async fn attempt(&mut self, recipient: Recipient) -> DispatchOutcome {
        let started = Instant::now();
        self.transition(WorkerState::Rendering);

        let shared = Arc::clone(&self.shared);
        let message = match shared.renderer.render(&shared.campaign, &recipient) {
            Ok(message) => message,
            Err(e) => {
                warn!(worker_id = self.id, email = %recipient.email, error = %e, "Render failed");
                return DispatchOutcome::failed(recipient, self.id, e)
                    .with_elapsed(started.elapsed());
            }
        };

        self.transition(WorkerState::Sending);
        let outcome = match shared.transport.send(&message).await {
            Ok(ack) => {
                debug!(
                    worker_id = self.id,
                    email = %recipient.email,
                    ack = ?ack.id,
                    "Message sent"
                );
                DispatchOutcome::sent(recipient, self.id)
            }
            Err(e) => {
                warn!(worker_id = self.id, email = %recipient.email, error = %e, "Send failed");
                DispatchOutcome::failed(recipient, self.id, e)
            }
        };
        outcome.with_elapsed(started.elapsed())
    }
}
