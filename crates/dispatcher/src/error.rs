//! Dispatcher error types

use thiserror::Error;

/// Run-level errors
///
/// Per-message failures never surface here; they are recorded as outcomes.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Run configuration rejected before anything started
    #[error("invalid dispatch config: {0}")]
    InvalidConfig(String),

    /// Transport could not be built from its configuration
    #[error("failed to set up transport '{transport}': {message}")]
    TransportSetup { transport: String, message: String },
}

impl DispatchError {
    /// Create a transport setup error
    pub fn transport_setup(transport: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportSetup {
            transport: transport.into(),
            message: message.into(),
        }
    }
}
