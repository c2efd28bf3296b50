//! Error types for CLI operations.

use contracts::DispatchReport;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Recipient source could not be opened; nothing was sent
    #[error("Recipient source unavailable: {message}")]
    SourceUnavailable { message: String },

    /// Report or retry list could not be written
    #[error("Failed to write {path}: {message}")]
    Output { path: String, message: String },

    /// The run finished but not every recipient was delivered
    #[error(
        "Dispatch incomplete: {failed} failed, {skipped} skipped{}",
        incomplete_flags(.cancelled, .source_error)
    )]
    Incomplete {
        failed: u64,
        skipped: u64,
        cancelled: bool,
        source_error: bool,
    },
}

fn incomplete_flags(cancelled: &bool, source_error: &bool) -> String {
    let mut flags = String::new();
    if *cancelled {
        flags.push_str(", cancelled");
    }
    if *source_error {
        flags.push_str(", source error");
    }
    flags
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
        }
    }

    pub fn output(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Output {
            path: path.into(),
            message: message.into(),
        }
    }

    /// `Some` when the report should turn into a non-zero exit status
    pub fn from_report(report: &DispatchReport) -> Option<Self> {
        if report.is_clean() {
            return None;
        }
        Some(Self::Incomplete {
            failed: report.failed_count,
            skipped: report.skipped_count,
            cancelled: report.cancelled,
            source_error: report.source_error.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_report_is_not_an_error() {
        let mut report = DispatchReport::default();
        report.sent_count = 3;
        assert!(CliError::from_report(&report).is_none());
    }

    #[test]
    fn test_incomplete_message() {
        let report = DispatchReport {
            failed_count: 2,
            skipped_count: 5,
            cancelled: true,
            ..Default::default()
        };
        let err = CliError::from_report(&report).unwrap();
        assert_eq!(
            err.to_string(),
            "Dispatch incomplete: 2 failed, 5 skipped, cancelled"
        );
    }
}
