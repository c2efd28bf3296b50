//! Pipeline orchestration module.

mod orchestrator;
mod output;

pub use orchestrator::{Pipeline, RunOverrides};
pub use output::{print_report, write_report_json, write_retry_csv};
