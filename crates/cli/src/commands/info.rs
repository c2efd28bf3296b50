//! `info` command implementation.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use contracts::CampaignBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    campaign: CampaignInfo,
    source: SourceInfo,
    dispatch: DispatchInfo,
    transport: TransportInfo,
}

#[derive(Serialize)]
struct CampaignInfo {
    from: String,
    subject: String,
    body_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_path: Option<String>,
    template_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    cta_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cta_link: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    variables: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SourceInfo {
    path: String,
    has_header: bool,
}

#[derive(Serialize)]
struct DispatchInfo {
    worker_count: usize,
    channel_capacity: usize,
    pace_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
}

#[derive(Serialize)]
struct TransportInfo {
    transport_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &CampaignBlueprint) -> ConfigInfo {
    let campaign = &blueprint.campaign;
    let dispatch = &blueprint.dispatch;

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        campaign: CampaignInfo {
            from: campaign.from.clone(),
            subject: campaign.subject.clone(),
            body_format: format!("{:?}", campaign.body_format),
            template_path: campaign
                .template_path
                .as_ref()
                .map(|p| p.display().to_string()),
            template_bytes: campaign.resolved_template().map_or(0, str::len),
            cta_text: campaign.cta_text.clone(),
            cta_link: campaign.cta_link.clone(),
            variables: campaign.variables.clone(),
        },
        source: SourceInfo {
            path: blueprint.source.path.display().to_string(),
            has_header: blueprint.source.has_header,
        },
        dispatch: DispatchInfo {
            worker_count: dispatch.worker_count,
            channel_capacity: dispatch.channel_capacity,
            pace_delay_ms: dispatch.pace_delay_ms,
            timeout_secs: dispatch.timeout().map(|t| t.as_secs()),
        },
        transport: TransportInfo {
            transport_type: blueprint.transport.transport_type.as_str().to_string(),
            params: blueprint.transport.params.clone(),
        },
    }
}

fn print_config_info(blueprint: &CampaignBlueprint) {
    let info = build_config_info(blueprint);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Mailcast Campaign Configuration              ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let campaign = &info.campaign;
    println!("✉️  Campaign");
    println!("   ├─ Version: {}", info.version);
    println!("   ├─ From: {}", campaign.from);
    println!("   ├─ Subject: {}", campaign.subject);
    println!("   ├─ Body format: {}", campaign.body_format);
    match &campaign.template_path {
        Some(path) => println!("   ├─ Template: {} ({} bytes)", path, campaign.template_bytes),
        None => println!("   ├─ Template: inline ({} bytes)", campaign.template_bytes),
    }
    if let (Some(text), Some(link)) = (&campaign.cta_text, &campaign.cta_link) {
        println!("   ├─ Call to action: {} -> {}", text, link);
    }
    println!("   └─ Variables: {}", campaign.variables.len());

    println!("\n📄 Source");
    println!("   ├─ Path: {}", info.source.path);
    println!("   └─ Header row: {}", info.source.has_header);

    let dispatch = &info.dispatch;
    println!("\n⚙️  Dispatch");
    println!("   ├─ Workers: {}", dispatch.worker_count);
    println!("   ├─ Channel capacity: {}", dispatch.channel_capacity);
    println!("   ├─ Pacing: {} ms", dispatch.pace_delay_ms);
    match dispatch.timeout_secs {
        Some(secs) => println!("   └─ Timeout: {} s", secs),
        None => println!("   └─ Timeout: none"),
    }

    println!("\n📤 Transport ({})", info.transport.transport_type);
    let mut params: Vec<_> = info.transport.params.iter().collect();
    params.sort();
    for (i, (key, value)) in params.iter().enumerate() {
        let prefix = if i == params.len() - 1 { "└─" } else { "├─" };
        println!("   {} {} = {}", prefix, key, value);
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_build_config_info() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[campaign]
from = "news@x.com"
subject = "Hello"
template = "Hi {{name}}"

[source]
path = "/data/recipients.csv"

[dispatch]
worker_count = 4
timeout_secs = 30

[transport]
transport_type = "file"
[transport.params]
dir = "/tmp/outbox"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let info = build_config_info(&blueprint);
        assert_eq!(info.campaign.template_bytes, 11);
        assert_eq!(info.dispatch.worker_count, 4);
        assert_eq!(info.dispatch.timeout_secs, Some(30));
        assert_eq!(info.transport.transport_type, "file");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["transport"]["params"]["dir"], "/tmp/outbox");
        assert!(json["campaign"].get("cta_text").is_none());
    }
}
