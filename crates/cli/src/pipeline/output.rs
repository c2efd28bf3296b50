//! Report output: console summary, JSON report, retry list.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use contracts::{DispatchReport, Recipient};

use crate::error::CliError;

/// Print the human-facing summary
pub fn print_report(report: &DispatchReport) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Dispatch Report                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📊 Overview");
    println!("   ├─ Duration: {:.2}s", report.duration_ms as f64 / 1000.0);
    println!("   ├─ Sent: {}", report.sent_count);
    println!("   ├─ Failed: {}", report.failed_count);
    println!("   ├─ Skipped: {}", report.skipped_count);
    println!("   └─ Malformed rows: {}", report.malformed_count);

    println!("\n⏱  Send latency");
    println!("   └─ {}", report.send_latency);

    if report.cancelled {
        println!("\n⚠️  Run was cancelled before every recipient was processed");
    }
    if let Some(ref err) = report.source_error {
        println!("\n⚠️  Source error: {}", err);
    }

    if !report.failures.is_empty() {
        println!("\n❌ Failures ({})", report.failures.len());
        for (i, failure) in report.failures.iter().enumerate() {
            let prefix = if i == report.failures.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!(
                "   {} {} <{}>: {}",
                prefix, failure.recipient.name, failure.recipient.email, failure.error
            );
        }
    }

    println!();
}

/// Write the full report as pretty JSON
pub fn write_report_json(report: &DispatchReport, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::output(path.display().to_string(), e.to_string()))?;
    fs::write(path, json).map_err(|e| CliError::output(path.display().to_string(), e.to_string()))
}

/// Write failed then skipped recipients as CSV, readable as a recipient source
///
/// Returns the number of rows written.
pub fn write_retry_csv(report: &DispatchReport, path: &Path) -> Result<usize, CliError> {
    let recipients: Vec<&Recipient> = report.retry_candidates().collect();
    fs::write(path, retry_csv(&recipients))
        .map_err(|e| CliError::output(path.display().to_string(), e.to_string()))?;
    Ok(recipients.len())
}

fn retry_csv(recipients: &[&Recipient]) -> String {
    let attributes: BTreeSet<&str> = recipients
        .iter()
        .flat_map(|r| r.attributes.keys().map(String::as_str))
        .collect();

    let mut out = String::from("name,email");
    for key in &attributes {
        out.push(',');
        out.push_str(&csv_field(key));
    }
    out.push('\n');

    for recipient in recipients {
        out.push_str(&csv_field(&recipient.name));
        out.push(',');
        out.push_str(&csv_field(&recipient.email));
        for key in &attributes {
            out.push(',');
            let value = recipient.attributes.get(*key).map_or("", String::as_str);
            out.push_str(&csv_field(value));
        }
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) || value.trim() != value {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
