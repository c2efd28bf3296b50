//! CampaignBlueprint - Config Loader output
//!
//! Describes a complete dispatch run: campaign content, recipient source,
//! worker pool settings and delivery transport.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::{BodyFormat, CampaignMetadata, ContractError};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete campaign configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CampaignBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Message content
    #[validate(nested)]
    pub campaign: CampaignConfig,

    /// Recipient list
    pub source: SourceConfig,

    /// Worker pool settings
    #[serde(default)]
    #[validate(nested)]
    pub dispatch: DispatchSettings,

    /// Delivery transport
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Campaign content
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CampaignConfig {
    /// Sender mailbox
    #[validate(length(min = 1, message = "sender cannot be empty"))]
    pub from: String,

    /// Subject template
    #[validate(length(min = 1, message = "subject cannot be empty"))]
    pub subject: String,

    /// Inline body template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Body template file (relative to the config file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,

    /// Content of `template_path`, filled in by the loader
    #[serde(skip)]
    pub template_body: Option<String>,

    /// Body content type
    #[serde(default)]
    pub body_format: BodyFormat,

    /// Call-to-action label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_text: Option<String>,

    /// Call-to-action link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_link: Option<String>,

    /// Extra template variables
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

/// Recipient source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// CSV file path (relative to the config file)
    pub path: PathBuf,

    /// First row is a header
    #[serde(default = "default_has_header")]
    pub has_header: bool,
}

fn default_has_header() -> bool {
    true
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchSettings {
    /// Number of concurrent workers
    #[serde(default = "default_worker_count")]
    #[validate(range(min = 1, max = 1024, message = "worker_count must be between 1 and 1024"))]
    pub worker_count: usize,

    /// Dispatch channel capacity (0 = synchronous handoff)
    #[serde(default)]
    pub channel_capacity: usize,

    /// Fixed delay after every send, per worker (milliseconds)
    #[serde(default)]
    pub pace_delay_ms: u64,

    /// Run timeout in seconds (0 = none)
    #[serde(default)]
    pub timeout_secs: u64,
}

fn default_worker_count() -> usize {
    5
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            channel_capacity: 0,
            pace_delay_ms: 0,
            timeout_secs: 0,
        }
    }
}

impl DispatchSettings {
    pub fn pace_delay(&self) -> Duration {
        Duration::from_millis(self.pace_delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Transport configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport type
    #[serde(default)]
    pub transport_type: TransportType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Transport type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// Log a summary, send nothing (dry run)
    #[default]
    Log,
    /// Write one .eml file per message
    File,
    /// Plain SMTP relay
    Smtp,
}

impl TransportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::File => "file",
            Self::Smtp => "smtp",
        }
    }
}

impl std::str::FromStr for TransportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "file" => Ok(Self::File),
            "smtp" => Ok(Self::Smtp),
            other => Err(format!("unknown transport type '{other}'")),
        }
    }
}

impl CampaignConfig {
    /// Body template source: inline text, else the loaded file
    pub fn resolved_template(&self) -> Option<&str> {
        self.template.as_deref().or(self.template_body.as_deref())
    }
}

impl CampaignBlueprint {
    /// Build the run-wide campaign metadata
    ///
    /// # Errors
    /// Fails if no template text is available (inline or loaded from file).
    pub fn to_campaign_metadata(&self) -> Result<CampaignMetadata, ContractError> {
        let campaign = &self.campaign;
        let template = campaign.resolved_template().ok_or_else(|| {
            ContractError::config_validation(
                "campaign.template",
                "no template text loaded (set 'template' or 'template_path')",
            )
        })?;

        Ok(CampaignMetadata {
            from: campaign.from.clone(),
            subject: campaign.subject.clone(),
            template: template.to_string(),
            body_format: campaign.body_format,
            cta_text: campaign.cta_text.clone(),
            cta_link: campaign.cta_link.clone(),
            variables: campaign.variables.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> CampaignBlueprint {
        CampaignBlueprint {
            version: ConfigVersion::V1,
            campaign: CampaignConfig {
                from: "News <news@x.com>".into(),
                subject: "Hello {{name}}".into(),
                template: Some("Hi {{name}}".into()),
                template_path: None,
                template_body: None,
                body_format: BodyFormat::Text,
                cta_text: None,
                cta_link: None,
                variables: BTreeMap::new(),
            },
            source: SourceConfig {
                path: "recipients.csv".into(),
                has_header: true,
            },
            dispatch: DispatchSettings::default(),
            transport: TransportConfig::default(),
        }
    }

    #[test]
    fn dispatch_settings_defaults() {
        let settings = DispatchSettings::default();
        assert_eq!(settings.worker_count, 5);
        assert_eq!(settings.channel_capacity, 0);
        assert_eq!(settings.pace_delay(), Duration::ZERO);
        assert_eq!(settings.timeout(), None);
    }

    #[test]
    fn field_rules_reject_zero_workers() {
        let mut bp = sample_blueprint();
        assert!(bp.validate().is_ok());
        bp.dispatch.worker_count = 0;
        let err = bp.validate().unwrap_err().to_string();
        assert!(err.contains("worker_count"), "got: {err}");
    }

    #[test]
    fn field_rules_reject_empty_subject() {
        let mut bp = sample_blueprint();
        bp.campaign.subject = String::new();
        assert!(bp.validate().is_err());
    }

    #[test]
    fn campaign_metadata_prefers_inline_template() {
        let mut bp = sample_blueprint();
        bp.campaign.template_body = Some("from file".into());
        let meta = bp.to_campaign_metadata().unwrap();
        assert_eq!(meta.template, "Hi {{name}}");

        bp.campaign.template = None;
        let meta = bp.to_campaign_metadata().unwrap();
        assert_eq!(meta.template, "from file");
    }

    #[test]
    fn campaign_metadata_requires_template() {
        let mut bp = sample_blueprint();
        bp.campaign.template = None;
        assert!(bp.to_campaign_metadata().is_err());
    }

    #[test]
    fn transport_type_from_str() {
        assert_eq!("SMTP".parse::<TransportType>(), Ok(TransportType::Smtp));
        assert!("carrier-pigeon".parse::<TransportType>().is_err());
    }
}
