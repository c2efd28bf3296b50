//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the dispatch pipeline:
//! recipient / campaign / message data, run outcomes, configuration blueprint,
//! error types and the three collaborator traits (source, renderer, transport).
//! Business crates only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data flow
//! `RecipientSource` -> producer -> dispatch channel -> workers
//! (`MessageRenderer` -> `DeliveryTransport`) -> `DispatchOutcome` -> `DispatchReport`

mod blueprint;
mod campaign;
mod error;
mod message;
mod outcome;
mod recipient;
mod renderer;
mod source;
mod transport;

pub use blueprint::*;
pub use campaign::*;
pub use error::*;
pub use message::*;
pub use outcome::*;
pub use recipient::Recipient;
pub use renderer::MessageRenderer;
pub use source::{LocalRecipientSource, RecipientSource};
pub use transport::{DeliveryTransport, LocalDeliveryTransport};
