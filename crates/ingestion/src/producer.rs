//! Producer: recipient source -> dispatch channel

use async_channel::SendError;
use contracts::{Recipient, RecipientSource, SourceError};
use observability::metrics::{
    record_malformed_record, record_queue_depth, record_recipient_enqueued,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::channel::DispatchSender;

/// What the producer did with the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    /// Recipients handed to the dispatch channel
    pub enqueued: u64,

    /// Rows skipped as malformed
    pub malformed: u64,

    /// Valid recipients read but never enqueued (cancellation)
    pub skipped: Vec<Recipient>,

    /// Read error that ended production early
    pub source_error: Option<SourceError>,

    /// Production stopped because of cancellation
    pub cancelled: bool,
}

/// Why the enqueue loop stopped before end-of-source
enum Interrupted {
    Cancelled,
    ChannelClosed,
}

/// Feed every valid record of `source` into `tx`, in source order
///
/// Suspends while the channel is full, or until a worker is waiting when the
/// channel has capacity 0. Closes the channel exactly once when the loop
/// ends, whatever the reason. After a cancellation the rest of the source is
/// read without enqueuing so every valid recipient ends up either
/// enqueued or in `skipped`.
#[instrument(
    name = "producer",
    skip(source, tx, cancel),
    fields(source = %source.locator())
)]
pub async fn produce<S>(
    mut source: S,
    tx: DispatchSender,
    cancel: CancellationToken,
) -> ProducerSummary
where
    S: RecipientSource,
{
    let mut summary = ProducerSummary::default();
    info!("producer started");

    let interrupted = loop {
        if cancel.is_cancelled() {
            break Some(Interrupted::Cancelled);
        }

        let Some(record) = source.next_record().await else {
            break None;
        };

        let recipient = match record {
            Ok(recipient) => recipient,
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "skipping malformed record");
                summary.malformed += 1;
                record_malformed_record();
                continue;
            }
            Err(err) => {
                error!(error = %err, "recipient source failed, stopping production");
                summary.source_error = Some(err);
                break None;
            }
        };

        // cancel wins when both are ready; the pending recipient is kept
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                summary.skipped.push(recipient);
                break Some(Interrupted::Cancelled);
            }
            sent = tx.send(recipient.clone()) => match sent {
                Ok(()) => {
                    summary.enqueued += 1;
                    record_recipient_enqueued();
                    record_queue_depth(tx.len());
                    debug!(email = %recipient.email, "recipient enqueued");
                }
                Err(SendError(recipient)) => {
                    warn!("dispatch channel closed by consumers");
                    summary.skipped.push(recipient);
                    break Some(Interrupted::ChannelClosed);
                }
            },
        }
    };

    // sole termination signal for the workers
    tx.close();
    drop(tx);

    if let Some(reason) = interrupted {
        if matches!(reason, Interrupted::Cancelled) {
            summary.cancelled = true;
        }
        drain_as_skipped(&mut source, &mut summary).await;
    }

    info!(
        enqueued = summary.enqueued,
        malformed = summary.malformed,
        skipped = summary.skipped.len(),
        cancelled = summary.cancelled,
        "producer finished"
    );
    summary
}

/// Read the rest of the source without enqueuing
async fn drain_as_skipped<S>(source: &mut S, summary: &mut ProducerSummary)
where
    S: RecipientSource,
{
    while let Some(record) = source.next_record().await {
        match record {
            Ok(recipient) => summary.skipped.push(recipient),
            Err(err) if err.is_recoverable() => {
                summary.malformed += 1;
                record_malformed_record();
            }
            Err(err) => {
                summary.source_error = Some(err);
                break;
            }
        }
    }
}
