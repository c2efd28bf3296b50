//! Delivery transport implementations

mod file;
mod log;
mod rfc5322;
mod smtp;

pub use file::{FileTransport, FileTransportConfig};
pub use log::LogTransport;
pub use smtp::{SmtpTransport, SmtpTransportConfig};

use contracts::{
    DeliveryAck, DeliveryTransport, Message, TransportConfig, TransportError, TransportType,
};
use tracing::instrument;

use crate::error::DispatchError;

/// Transport selected by configuration
pub enum ConfiguredTransport {
    Log(LogTransport),
    File(FileTransport),
    Smtp(SmtpTransport),
}

impl DeliveryTransport for ConfiguredTransport {
    fn name(&self) -> &str {
        match self {
            Self::Log(t) => t.name(),
            Self::File(t) => t.name(),
            Self::Smtp(t) => t.name(),
        }
    }

    async fn send(&self, message: &Message) -> Result<DeliveryAck, TransportError> {
        match self {
            Self::Log(t) => t.send(message).await,
            Self::File(t) => t.send(message).await,
            Self::Smtp(t) => t.send(message).await,
        }
    }
}

/// Create a transport from configuration
#[instrument(
    name = "dispatcher_build_transport",
    skip(config),
    fields(transport_type = config.transport_type.as_str())
)]
pub fn build_transport(config: &TransportConfig) -> Result<ConfiguredTransport, DispatchError> {
    let name = config.transport_type.as_str();
    match config.transport_type {
        TransportType::Log => Ok(ConfiguredTransport::Log(LogTransport::new(name))),
        TransportType::File => {
            let transport = FileTransport::from_params(name, &config.params)
                .map_err(|e| DispatchError::transport_setup(name, e.to_string()))?;
            Ok(ConfiguredTransport::File(transport))
        }
        TransportType::Smtp => {
            let transport = SmtpTransport::from_params(name, &config.params)
                .map_err(|e| DispatchError::transport_setup(name, e))?;
            Ok(ConfiguredTransport::Smtp(transport))
        }
    }
}
