//! FileTransport - writes one `.eml` file per message

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use contracts::{DeliveryAck, DeliveryTransport, Message, TransportError};
use tracing::{debug, error, instrument};

use super::rfc5322::{format_message, message_id};

/// Configuration for FileTransport
#[derive(Debug, Clone)]
pub struct FileTransportConfig {
    /// Output directory
    pub dir: PathBuf,
}

impl FileTransportConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let dir = params
            .get("dir")
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| "missing 'dir' parameter".to_string())?;
        Ok(Self {
            dir: PathBuf::from(dir),
        })
    }
}

/// Transport that drops messages into a directory
///
/// Files are named `<seq>-<sanitized email>.eml`; `seq` is unique per
/// transport instance, so concurrent workers never collide.
pub struct FileTransport {
    name: String,
    config: FileTransportConfig,
    seq: AtomicU64,
}

impl FileTransport {
    /// Create a new FileTransport, creating the directory if missing
    pub fn new(name: impl Into<String>, config: FileTransportConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.dir)?;

        Ok(Self {
            name: name.into(),
            config,
            seq: AtomicU64::new(0),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileTransportConfig::from_params(params)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Self::new(name, config)
    }

    /// Output directory
    pub fn dir(&self) -> &std::path::Path {
        &self.config.dir
    }

    fn file_name(seq: u64, email: &str) -> String {
        let sanitized: String = email
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{seq:06}-{sanitized}.eml")
    }
}

impl DeliveryTransport for FileTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_transport_send",
        skip(self, message),
        fields(transport = %self.name, email = %message.to_address)
    )]
    async fn send(&self, message: &Message) -> Result<DeliveryAck, TransportError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Utc::now();
        let text = format_message(message, now, &message_id(message, seq, now));

        let file_name = Self::file_name(seq, &message.to_address);
        let path = self.config.dir.join(&file_name);
        tokio::fs::write(&path, text).await.map_err(|e| {
            error!(transport = %self.name, path = %path.display(), error = %e, "Write failed");
            TransportError::from(e)
        })?;

        debug!(transport = %self.name, file = %file_name, "Message written");
        Ok(DeliveryAck::with_id(file_name))
    }
}
