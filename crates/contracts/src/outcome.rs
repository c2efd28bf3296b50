//! Dispatch outcomes and the final run report

use serde::{Deserialize, Serialize};

use crate::{DeliveryError, Recipient};

/// Result status of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Sent,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Per-recipient result, produced by a worker right after the attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// The recipient this attempt was for
    pub recipient: Recipient,

    /// Worker that made the attempt
    pub worker_id: usize,

    /// Sent / Failed
    pub status: OutcomeStatus,

    /// Failure detail (only for `Failed`)
    pub error: Option<DeliveryError>,

    /// Render + send wall time in milliseconds
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl DispatchOutcome {
    pub fn sent(recipient: Recipient, worker_id: usize) -> Self {
        Self {
            recipient,
            worker_id,
            status: OutcomeStatus::Sent,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn failed(
        recipient: Recipient,
        worker_id: usize,
        error: impl Into<DeliveryError>,
    ) -> Self {
        Self {
            recipient,
            worker_id,
            status: OutcomeStatus::Failed,
            error: Some(error.into()),
            elapsed_ms: 0,
        }
    }

    /// Attach the measured attempt duration
    pub fn with_elapsed(mut self, elapsed: std::time::Duration) -> Self {
        self.elapsed_ms = elapsed.as_millis() as u64;
        self
    }
}

/// Latency statistics for the attempts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
}

impl std::fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}ms, max={:.1}ms, mean={:.1}ms, std={:.1}ms (n={})",
                self.min_ms, self.max_ms, self.mean_ms, self.std_dev_ms, self.count
            )
        }
    }
}

/// A failed recipient with its error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub recipient: Recipient,
    pub error: DeliveryError,
}

/// Final result of a dispatch run
///
/// Invariant: `sent_count + failed_count + skipped_count` equals the number
/// of valid records read from the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Messages accepted by the transport
    pub sent_count: u64,

    /// Messages that failed to render or send
    pub failed_count: u64,

    /// Valid recipients never attempted (cancelled run)
    pub skipped_count: u64,

    /// Source rows skipped because they could not be parsed
    pub malformed_count: u64,

    /// Every failed recipient with its error, in completion order
    pub failures: Vec<FailedDelivery>,

    /// Every skipped recipient
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Recipient>,

    /// Read error that stopped the producer early, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,

    /// The run was cancelled (signal or timeout)
    pub cancelled: bool,

    /// Per-attempt latency
    #[serde(default)]
    pub send_latency: LatencySummary,

    /// Wall time of the run in milliseconds
    pub duration_ms: u64,
}

impl DispatchReport {
    /// Fold one outcome into the report
    pub fn record(&mut self, outcome: DispatchOutcome) {
        match (outcome.status, outcome.error) {
            (OutcomeStatus::Sent, _) => self.sent_count += 1,
            (OutcomeStatus::Failed, error) => {
                self.failed_count += 1;
                self.failures.push(FailedDelivery {
                    recipient: outcome.recipient,
                    error: error.unwrap_or(DeliveryError::Transport {
                        error: crate::TransportError::protocol("unspecified failure"),
                    }),
                });
            }
        }
    }

    /// Record a recipient that was never attempted
    pub fn record_skipped(&mut self, recipient: Recipient) {
        self.skipped_count += 1;
        self.skipped.push(recipient);
    }

    /// Recipients accounted for (sent + failed + skipped)
    pub fn total(&self) -> u64 {
        self.sent_count + self.failed_count + self.skipped_count
    }

    /// Recipients that should be retried: failed then skipped
    pub fn retry_candidates(&self) -> impl Iterator<Item = &Recipient> {
        self.failures
            .iter()
            .map(|f| &f.recipient)
            .chain(self.skipped.iter())
    }

    /// Completed with every message sent
    pub fn is_clean(&self) -> bool {
        self.failed_count == 0
            && self.skipped_count == 0
            && self.source_error.is_none()
            && !self.cancelled
    }
}

impl std::fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Report ===")?;
        writeln!(f, "Sent: {}", self.sent_count)?;
        writeln!(f, "Failed: {}", self.failed_count)?;
        writeln!(f, "Skipped: {}", self.skipped_count)?;
        writeln!(f, "Malformed rows: {}", self.malformed_count)?;
        writeln!(f, "Send latency: {}", self.send_latency)?;
        writeln!(f, "Duration: {:.2}s", self.duration_ms as f64 / 1000.0)?;
        if self.cancelled {
            writeln!(f, "Run was cancelled")?;
        }
        if let Some(ref err) = self.source_error {
            writeln!(f, "Source error: {}", err)?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "Failures:")?;
            for failure in &self.failures {
                writeln!(
                    f,
                    "  {} <{}>: {}",
                    failure.recipient.name, failure.recipient.email, failure.error
                )?;
            }
        }
        Ok(())
    }
}
