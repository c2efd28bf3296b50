//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CampaignBlueprint, TransportType};
use renderer::TemplateRenderer;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    from: String,
    subject: String,
    source: String,
    worker_count: usize,
    transport: String,
    template_fields: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.clone(),
        error: Some(error),
        warnings: None,
        summary: None,
    };

    if !args.config.exists() {
        return invalid(format!("File not found: {}", args.config.display()));
    }

    let blueprint = match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => blueprint,
        Err(e) => return invalid(e.to_string()),
    };

    // templates must compile too
    let campaign = match blueprint.to_campaign_metadata() {
        Ok(campaign) => campaign,
        Err(e) => return invalid(e.to_string()),
    };
    let renderer = match TemplateRenderer::new(&campaign) {
        Ok(renderer) => renderer,
        Err(e) => return invalid(format!("template error: {e}")),
    };

    let attribute_fields: Vec<String> = renderer
        .attribute_fields(&campaign)
        .into_iter()
        .map(str::to_string)
        .collect();
    let warnings = collect_warnings(&blueprint, &attribute_fields);

    let mut template_fields: Vec<String> = renderer.fields().map(str::to_string).collect();
    template_fields.sort();
    template_fields.dedup();

    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            from: blueprint.campaign.from.clone(),
            subject: blueprint.campaign.subject.clone(),
            source: blueprint.source.path.display().to_string(),
            worker_count: blueprint.dispatch.worker_count,
            transport: blueprint.transport.transport_type.as_str().to_string(),
            template_fields,
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &CampaignBlueprint, attribute_fields: &[String]) -> Vec<String> {
    let mut warnings = Vec::new();

    match blueprint.transport.transport_type {
        TransportType::Log => {
            warnings.push("Log transport in use - messages are logged, not delivered".to_string());
        }
        TransportType::Smtp if blueprint.dispatch.pace_delay_ms == 0 => {
            warnings.push(
                "SMTP transport without pacing (dispatch.pace_delay_ms = 0) may hit relay rate limits"
                    .to_string(),
            );
        }
        _ => {}
    }

    if !blueprint.source.path.exists() {
        warnings.push(format!(
            "Recipient source '{}' does not exist yet - a run would abort",
            blueprint.source.path.display()
        ));
    }

    for field in attribute_fields {
        warnings.push(format!(
            "Template field '{}' must be a column of the recipient CSV, rows without it will fail",
            field
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  From: {}", summary.from);
            println!("  Subject: {}", summary.subject);
            println!("  Source: {}", summary.source);
            println!("  Workers: {}", summary.worker_count);
            println!("  Transport: {}", summary.transport);
            println!("  Template fields: {}", summary.template_fields.join(", "));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
