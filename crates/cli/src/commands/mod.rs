mod dashboard;
mod latest;
mod rollup;

pub(crate) use dashboard::cmd_dashboard;
pub(crate) use latest::cmd_latest;
pub(crate) use rollup::cmd_rollup;

use std::path::Path;
use std::process;

use serde::de::DeserializeOwned;

use crm_eval::{CalendarDate, DateFilter, RollupReport};
use crm_storage::Dataset;

use crate::{report_error, OutputFormat};

/// Date-range flags shared by `rollup` and `dashboard`.
pub(crate) struct DateArgs {
    pub from: Option<CalendarDate>,
    pub to: Option<CalendarDate>,
    pub field: Option<String>,
}

impl DateArgs {
    pub(crate) fn filter(&self) -> Option<DateFilter> {
        let (from, to) = (self.from?, self.to?);
        let filter = DateFilter::new(from.0, to.0);
        Some(match &self.field {
            Some(field) => filter.on_field(field),
            None => filter,
        })
    }
}

/// Read and deserialize a JSON file, exiting with a message on failure.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path, output: OutputFormat, quiet: bool) -> T {
    let text = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("error: invalid JSON in {}: {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn load_dataset(path: &Path, output: OutputFormat, quiet: bool) -> Dataset {
    match Dataset::load(path) {
        Ok(d) => d,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("serialization error: {}", e))
    );
}

/// Text rendering of a report: a counts table, then totals, then any
/// diagnostics.
pub(crate) fn print_report_text(report: &RollupReport) {
    let width = report
        .counts
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("metric".len());
    println!("{:<width$}  {:>7}  {:>7}", "metric", "total", "flagged");
    for (name, count) in &report.counts {
        println!(
            "{:<width$}  {:>7}  {:>7}",
            name, count.total, count.flagged
        );
    }
    println!(
        "considered: {}, excluded by date: {}",
        report.considered, report.excluded_by_date
    );
    if !report.diagnostics.is_empty() {
        println!("{} diagnostic(s):", report.diagnostics.len());
        for d in &report.diagnostics {
            println!("  {} / {}: {}", d.entity_id, d.metric, d.cause);
        }
    }
}
