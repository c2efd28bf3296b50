//! SmtpTransport - plain SMTP relay, one connection per message
//!
//! Dialogue: greeting -> EHLO (HELO fallback) -> MAIL FROM -> RCPT TO ->
//! DATA -> QUIT. No TLS, no authentication: meant for a local relay or a
//! capture server such as MailHog / Mailpit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use contracts::{mailbox_address, DeliveryAck, DeliveryTransport, Message, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

use super::rfc5322::{format_message, message_id};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 1025;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Configuration for SmtpTransport
#[derive(Debug, Clone)]
pub struct SmtpTransportConfig {
    pub host: String,
    pub port: u16,
    /// Whole-dialogue timeout per message
    pub timeout: Duration,
    /// Name announced in EHLO / HELO
    pub helo_name: String,
}

impl Default for SmtpTransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            helo_name: "localhost".to_string(),
        }
    }
}

impl SmtpTransportConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let mut config = Self::default();

        if let Some(host) = params.get("host") {
            config.host = host.clone();
        }
        if let Some(port) = params.get("port") {
            config.port = port
                .parse()
                .map_err(|e| format!("invalid port '{}': {}", port, e))?;
        }
        if let Some(timeout) = params.get("timeout_ms") {
            let ms: u64 = timeout
                .parse()
                .map_err(|e| format!("invalid timeout_ms '{}': {}", timeout, e))?;
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(helo) = params.get("helo_name") {
            config.helo_name = helo.clone();
        }

        Ok(config)
    }
}

/// A parsed server reply
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    text: String,
}

impl Reply {
    fn is_positive(&self) -> bool {
        (200..400).contains(&self.code)
    }

    fn is_negative(&self) -> bool {
        self.code >= 400
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}

/// One SMTP session over a TCP connection
struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Session {
    async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| TransportError::connection(format!("{host}:{port}: {e}")))?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
        })
    }

    /// Read a (possibly multi-line) reply
    async fn read_reply(&mut self) -> Result<Reply, TransportError> {
        let mut text = Vec::new();
        loop {
            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| TransportError::connection(format!("connection lost: {e}")))?;
            if n == 0 {
                return Err(TransportError::connection("server closed the connection"));
            }

            let line = line.trim_end_matches(['\r', '\n']);
            let (code, rest) = line
                .get(..3)
                .and_then(|code| code.parse::<u16>().ok())
                .map(|code| (code, &line[3..]))
                .ok_or_else(|| TransportError::protocol(format!("malformed reply '{line}'")))?;

            let (more, message) = match rest.chars().next() {
                Some('-') => (true, &rest[1..]),
                Some(' ') => (false, &rest[1..]),
                None => (false, ""),
                Some(_) => {
                    return Err(TransportError::protocol(format!("malformed reply '{line}'")))
                }
            };
            text.push(message.to_string());

            if !more {
                return Ok(Reply {
                    code,
                    text: text.join(" "),
                });
            }
        }
    }

    async fn write_all(&mut self, data: &str) -> Result<(), TransportError> {
        self.writer
            .write_all(data.as_bytes())
            .await
            .map_err(|e| TransportError::connection(format!("connection lost: {e}")))
    }

    async fn command(&mut self, line: &str) -> Result<Reply, TransportError> {
        debug!(command = %line, "C:");
        self.write_all(line).await?;
        self.write_all("\r\n").await?;
        let reply = self.read_reply().await?;
        debug!(reply = %reply, "S:");
        Ok(reply)
    }
}

/// Expect a positive completion; 4xx/5xx are rejections, anything else is a protocol error
fn expect(reply: Reply, stage: &str, accepted: &[u16]) -> Result<Reply, TransportError> {
    if accepted.contains(&reply.code) {
        Ok(reply)
    } else if reply.is_negative() {
        Err(TransportError::rejected(format!("{stage}: {reply}")))
    } else {
        Err(TransportError::protocol(format!("{stage}: unexpected reply {reply}")))
    }
}

/// Escape lines starting with '.' (RFC 5321 4.5.2)
fn dot_stuff(data: &str) -> String {
    let mut out = String::with_capacity(data.len() + 16);
    for line in data.split_inclusive("\r\n") {
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    out
}

/// Plain SMTP transport
pub struct SmtpTransport {
    name: String,
    config: SmtpTransportConfig,
    seq: AtomicU64,
}

impl SmtpTransport {
    /// Create a new SmtpTransport
    pub fn new(name: impl Into<String>, config: SmtpTransportConfig) -> Self {
        Self {
            name: name.into(),
            config,
            seq: AtomicU64::new(0),
        }
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, String> {
        Ok(Self::new(name, SmtpTransportConfig::from_params(params)?))
    }

    pub fn config(&self) -> &SmtpTransportConfig {
        &self.config
    }

    async fn deliver(&self, message: &Message) -> Result<DeliveryAck, TransportError> {
        let mut session = Session::connect(&self.config.host, self.config.port).await?;

        let greeting = session.read_reply().await?;
        expect(greeting, "greeting", &[220])?;

        let ehlo = session
            .command(&format!("EHLO {}", self.config.helo_name))
            .await?;
        if !ehlo.is_positive() {
            let helo = session
                .command(&format!("HELO {}", self.config.helo_name))
                .await?;
            expect(helo, "HELO", &[250])?;
        }

        let from = mailbox_address(&message.from);
        let reply = session.command(&format!("MAIL FROM:<{from}>")).await?;
        expect(reply, "MAIL FROM", &[250])?;

        let reply = session
            .command(&format!("RCPT TO:<{}>", message.to_address))
            .await?;
        expect(reply, "RCPT TO", &[250, 251])?;

        let reply = session.command("DATA").await?;
        expect(reply, "DATA", &[354])?;

        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Utc::now();
        let text = format_message(message, now, &message_id(message, seq, now));
        session.write_all(&dot_stuff(&text)).await?;
        let reply = session.command(".").await?;
        let accepted = expect(reply, "end of data", &[250])?;

        if let Err(e) = session.command("QUIT").await {
            // message already accepted
            warn!(transport = %self.name, error = %e, "QUIT failed");
        }

        Ok(DeliveryAck::with_id(accepted.text))
    }
}

impl DeliveryTransport for SmtpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "smtp_transport_send",
        skip(self, message),
        fields(transport = %self.name, email = %message.to_address)
    )]
    async fn send(&self, message: &Message) -> Result<DeliveryAck, TransportError> {
        match tokio::time::timeout(self.config.timeout, self.deliver(message)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(format!(
                "no completion within {}ms",
                self.config.timeout.as_millis()
            ))),
        }
    }
}
