//! DeliveryTransport trait - Worker output interface

use crate::{DeliveryAck, Message, TransportError};

/// Message delivery
///
/// One transport instance is shared by every worker, so `send` takes `&self`.
/// From the worker's point of view a send is synchronous: the await is its
/// suspension point and it is never interrupted halfway.
#[trait_variant::make(DeliveryTransport: Send)]
pub trait LocalDeliveryTransport {
    /// Transport name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one message
    ///
    /// # Errors
    /// Returns a classified `TransportError`; the caller records it and continues.
    async fn send(&self, message: &Message) -> Result<DeliveryAck, TransportError>;
}
