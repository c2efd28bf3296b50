//! Layered error definitions
//!
//! Categorized by source: config / source / template / transport

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration and general-purpose error
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Recipient source errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source locator could not be opened. Fatal for the whole run.
    #[error("recipient source '{locator}' unavailable: {reason}")]
    Unavailable { locator: String, reason: String },

    /// A single row could not be parsed into a recipient. The row is skipped.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Reading failed after the source was opened. Ends the stream.
    #[error("failed to read recipient source: {reason}")]
    Read { reason: String },
}

impl SourceError {
    pub fn unavailable(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    /// Whether the stream may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedRecord { .. })
    }
}

/// Template compilation / rendering errors
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TemplateError {
    /// No template was provided
    #[error("template missing: {0}")]
    Missing(String),

    /// Template text could not be compiled
    #[error("template syntax error at byte {offset}: {reason}")]
    Syntax { offset: usize, reason: String },

    /// A placeholder has no value for this recipient
    #[error("missing template field '{0}'")]
    MissingField(String),
}

/// Transport failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Could not reach the transport (connection refused, DNS...)
    Connection,
    /// The transport refused the message or the recipient
    Rejected,
    /// The send did not complete in time
    Timeout,
    /// Local IO failure (file transport)
    Io,
    /// Unexpected reply from the remote side
    Protocol,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
            Self::Io => "io",
            Self::Protocol => "protocol",
        }
    }
}

/// Delivery transport error
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("transport error ({}): {reason}", .kind.as_str())]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub reason: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn connection(reason: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, reason)
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Rejected, reason)
    }

    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, reason)
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, reason)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::new(TransportErrorKind::Io, e.to_string())
    }
}

/// Per-message failure captured in an outcome
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum DeliveryError {
    #[error("render failed: {error}")]
    Template { error: TemplateError },

    #[error("send failed: {error}")]
    Transport { error: TransportError },
}

impl DeliveryError {
    /// Short label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Template { .. } => "template",
            Self::Transport { error } => error.kind.as_str(),
        }
    }
}

impl From<TemplateError> for DeliveryError {
    fn from(error: TemplateError) -> Self {
        Self::Template { error }
    }
}

impl From<TransportError> for DeliveryError {
    fn from(error: TransportError) -> Self {
        Self::Transport { error }
    }
}
