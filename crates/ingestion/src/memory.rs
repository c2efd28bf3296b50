//! In-memory recipient source
//!
//! Used by tests and demos. Malformed entries can be injected at chosen
//! positions to exercise the skip path.

use std::collections::VecDeque;

use contracts::{Recipient, RecipientSource, SourceError};

/// Recipient source backed by a `Vec`
#[derive(Debug, Clone, Default)]
pub struct VecRecipientSource {
    locator: String,
    records: VecDeque<Result<Recipient, SourceError>>,
}

impl VecRecipientSource {
    /// All-valid source
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self::from_records(recipients.into_iter().map(Ok).collect())
    }

    /// Source yielding exactly these records, errors included
    pub fn from_records(records: Vec<Result<Recipient, SourceError>>) -> Self {
        Self {
            locator: "memory".to_string(),
            records: records.into(),
        }
    }

    /// Insert a malformed record before position `index`
    pub fn with_malformed_at(mut self, index: usize, reason: impl Into<String>) -> Self {
        let index = index.min(self.records.len());
        self.records
            .insert(index, Err(SourceError::malformed(index + 1, reason)));
        self
    }

    /// Append a read failure that ends the stream
    pub fn with_read_error(mut self, reason: impl Into<String>) -> Self {
        self.records.push_back(Err(SourceError::Read {
            reason: reason.into(),
        }));
        self
    }

    /// Records not yet yielded
    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl RecipientSource for VecRecipientSource {
    fn locator(&self) -> &str {
        &self.locator
    }

    async fn next_record(&mut self) -> Option<Result<Recipient, SourceError>> {
        let record = self.records.pop_front()?;
        if matches!(record, Err(SourceError::Read { .. })) {
            self.records.clear();
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_injection() {
        let mut source = VecRecipientSource::new(vec![
            Recipient::new("Alice", "a@x.com"),
            Recipient::new("Bob", "b@x.com"),
        ])
        .with_malformed_at(1, "bad row");

        assert_eq!(source.remaining(), 3);
        assert!(source.next_record().await.unwrap().is_ok());
        assert!(matches!(
            source.next_record().await,
            Some(Err(SourceError::MalformedRecord { line: 2, .. }))
        ));
        assert_eq!(source.next_record().await.unwrap().unwrap().name, "Bob");
        assert!(source.next_record().await.is_none());
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        let mut source = VecRecipientSource::new(vec![Recipient::new("Alice", "a@x.com")])
            .with_read_error("disk gone");
        assert!(source.next_record().await.unwrap().is_ok());
        assert!(matches!(
            source.next_record().await,
            Some(Err(SourceError::Read { .. }))
        ));
        assert!(source.next_record().await.is_none());
    }
}
