//! # Ingestion
//!
//! Recipient ingestion module.
//!
//! Responsibilities:
//! - Read recipient records from a bounded source (CSV file, in-memory list)
//! - Skip malformed rows without stopping the run
//! - Feed valid recipients into the dispatch channel with backpressure
//!   (capacity 0: synchronous handoff to a waiting worker)
//! - Close the channel exactly once when the source is exhausted
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{dispatch_channel, produce, CsvOptions, CsvRecipientSource};
//! use tokio_util::sync::CancellationToken;
//!
//! let source = CsvRecipientSource::open("recipients.csv", CsvOptions::default()).await?;
//! let (tx, rx) = dispatch_channel(16);
//!
//! let cancel = CancellationToken::new();
//! let summary = produce(source, tx, cancel.clone()).await;
//! println!("enqueued {}", summary.enqueued);
//! ```

mod channel;
mod csv;
mod memory;
mod producer;

// Re-exports
pub use contracts::{Recipient, RecipientSource, SourceError};
pub use channel::{dispatch_channel, DispatchReceiver, DispatchSender};
pub use csv::{CsvOptions, CsvRecipientSource};
pub use memory::VecRecipientSource;
pub use producer::{produce, ProducerSummary};
