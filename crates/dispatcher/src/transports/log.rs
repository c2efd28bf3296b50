//! LogTransport - logs a message summary via tracing, sends nothing

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{DeliveryAck, DeliveryTransport, Message, TransportError};
use tracing::{info, instrument};

/// Dry-run transport
pub struct LogTransport {
    name: String,
    sent: AtomicU64,
}

impl LogTransport {
    /// Create a new LogTransport with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: AtomicU64::new(0),
        }
    }

    /// Messages acknowledged so far
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl DeliveryTransport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_transport_send",
        skip(self, message),
        fields(transport = %self.name, email = %message.to_address)
    )]
    async fn send(&self, message: &Message) -> Result<DeliveryAck, TransportError> {
        let seq = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            transport = %self.name,
            seq,
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            bytes = message.body.len(),
            "Message accepted (dry run)"
        );
        Ok(DeliveryAck::with_id(format!("log-{seq}")))
    }
}
