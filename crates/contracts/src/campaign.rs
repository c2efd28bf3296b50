//! CampaignMetadata - run-wide, read-only message data

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body content type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyFormat {
    /// text/plain
    #[default]
    Text,
    /// text/html, substituted values are escaped
    Html,
}

impl BodyFormat {
    /// MIME content type
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text => "text/plain; charset=utf-8",
            Self::Html => "text/html; charset=utf-8",
        }
    }
}

/// Campaign metadata shared by every message of a run
///
/// Built once from the configuration and shared between workers behind an
/// `Arc`; never mutated after the producer starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignMetadata {
    /// Sender mailbox (`Name <address>` or bare address)
    pub from: String,

    /// Subject line template
    pub subject: String,

    /// Body template source
    pub template: String,

    /// Body content type
    #[serde(default)]
    pub body_format: BodyFormat,

    /// Call-to-action label
    #[serde(default)]
    pub cta_text: Option<String>,

    /// Call-to-action link
    #[serde(default)]
    pub cta_link: Option<String>,

    /// Extra campaign-wide template variables
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl CampaignMetadata {
    /// Bare sender address (for the SMTP envelope)
    pub fn from_address(&self) -> &str {
        mailbox_address(&self.from)
    }
}

/// Extract the address part of a mailbox
///
/// `"News <news@x.com>"` -> `news@x.com`, `news@x.com` -> `news@x.com`.
pub fn mailbox_address(mailbox: &str) -> &str {
    let trimmed = mailbox.trim();
    match (trimmed.rfind('<'), trimmed.rfind('>')) {
        (Some(start), Some(end)) if start < end => trimmed[start + 1..end].trim(),
        _ => trimmed,
    }
}
