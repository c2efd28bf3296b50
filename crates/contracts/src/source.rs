//! RecipientSource trait - Producer input interface
//!
//! Sequential, bounded stream of recipient records. Opening the source
//! (and failing with `SourceError::Unavailable`) is the job of each
//! implementation's constructor, so a run never starts on a dead source.

use crate::{Recipient, SourceError};

/// Recipient record stream
#[trait_variant::make(RecipientSource: Send)]
pub trait LocalRecipientSource {
    /// Source locator (path, name) used for logging
    fn locator(&self) -> &str;

    /// Next record in source order
    ///
    /// Returns `None` at end-of-source. A `MalformedRecord` error describes
    /// one bad row; the stream continues after it. Any other error ends the
    /// stream.
    async fn next_record(&mut self) -> Option<Result<Recipient, SourceError>>;
}
