//! MessageRenderer trait - Worker rendering interface

use crate::{CampaignMetadata, Message, Recipient, TemplateError};

/// Turns a recipient plus campaign metadata into a final message
///
/// Implementations must be pure: the same inputs always render the same
/// bytes. Shared read-only between workers.
pub trait MessageRenderer: Send + Sync {
    /// Render one message
    ///
    /// # Errors
    /// `TemplateError` on a missing template or an unresolved field; the
    /// worker records it as a failed outcome and moves on.
    fn render(
        &self,
        campaign: &CampaignMetadata,
        recipient: &Recipient,
    ) -> Result<Message, TemplateError>;
}
