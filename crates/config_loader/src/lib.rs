//! # Config Loader
//!
//! Campaign configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Resolve relative paths and load the body template file
//! - Generate `CampaignBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("campaign.toml")).unwrap();
//! println!("Subject: {}", blueprint.campaign.subject);
//! ```

mod parser;
mod validator;

pub use contracts::CampaignBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;
use tracing::debug;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    /// Relative `source.path` and `campaign.template_path` are resolved
    /// against the directory of the configuration file.
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    /// - Template file read failure
    pub fn load_from_path(path: &Path) -> Result<CampaignBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse_and_validate(&content, format, base_dir)
    }

    /// Load configuration from string
    ///
    /// Relative paths are resolved against the current directory.
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    /// - Template file read failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CampaignBlueprint, ContractError> {
        Self::parse_and_validate(content, format, Path::new("."))
    }

    /// Serialize CampaignBlueprint to TOML string
    pub fn to_toml(blueprint: &CampaignBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize CampaignBlueprint to JSON string
    pub fn to_json(blueprint: &CampaignBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse, validate, then resolve file references
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
        base_dir: &Path,
    ) -> Result<CampaignBlueprint, ContractError> {
        let mut blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Self::resolve_paths(&mut blueprint, base_dir)?;
        Ok(blueprint)
    }

    /// Make relative paths absolute-from-config and load the template file
    fn resolve_paths(
        blueprint: &mut CampaignBlueprint,
        base_dir: &Path,
    ) -> Result<(), ContractError> {
        if blueprint.source.path.is_relative() {
            blueprint.source.path = base_dir.join(&blueprint.source.path);
        }

        if let Some(template_path) = blueprint.campaign.template_path.as_mut() {
            if template_path.is_relative() {
                *template_path = base_dir.join(&*template_path);
            }
            let body = std::fs::read_to_string(&*template_path).map_err(|e| {
                ContractError::config_validation(
                    "campaign.template_path",
                    format!("cannot read template '{}': {e}", template_path.display()),
                )
            })?;
            debug!(path = %template_path.display(), bytes = body.len(), "template loaded");
            blueprint.campaign.template_body = Some(body);
        }

        Ok(())
    }
}
