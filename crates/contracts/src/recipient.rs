//! Recipient - Recipient Source output

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single recipient record
///
/// Identity is the email address. Duplicates are not merged: two records with
/// the same email produce two sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recipient {
    /// Display name
    pub name: String,

    /// Email address
    pub email: String,

    /// Extra source columns, usable as template fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an extra attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// First word of the display name
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    /// RFC 5322 mailbox, e.g. `Alice Smith <alice@example.com>`
    pub fn mailbox(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            return self.email.clone();
        }
        if name.contains(|c: char| matches!(c, '"' | ',' | '<' | '>' | '@' | ';' | ':')) {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{}\" <{}>", escaped, self.email)
        } else {
            format!("{} <{}>", name, self.email)
        }
    }
}
