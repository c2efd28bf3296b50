//! Message - Renderer output, Transport input

use serde::{Deserialize, Serialize};

use crate::BodyFormat;

/// A fully rendered message
///
/// Owned by the worker that rendered it; the transport only borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender mailbox
    pub from: String,

    /// Recipient mailbox (`Name <email>`)
    pub to: String,

    /// Bare recipient address (SMTP envelope)
    pub to_address: String,

    /// Rendered subject
    pub subject: String,

    /// Rendered body
    pub body: String,

    /// Body content type
    pub body_format: BodyFormat,
}

/// Transport acknowledgement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAck {
    /// Transport-specific id (queue id, file name...), if any
    pub id: Option<String>,
}

impl DeliveryAck {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }
}
