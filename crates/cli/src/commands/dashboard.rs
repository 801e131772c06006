use std::path::Path;
use std::process;

use crm_eval::{dashboard, evaluate, RollupRequest};

use super::{load_dataset, print_json, print_report_text, DateArgs};
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_dashboard(
    dataset_path: &Path,
    name: &str,
    dates: &DateArgs,
    select: &[String],
    output: OutputFormat,
    quiet: bool,
) {
    let board = match dashboard(name) {
        Ok(b) => b,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let metrics = if select.is_empty() {
        board.metrics
    } else {
        match board.metrics.restrict(select) {
            Ok(m) => m,
            Err(e) => {
                report_error(&format!("error: {}", e), output, quiet);
                process::exit(1);
            }
        }
    };

    let dataset = load_dataset(dataset_path, output, quiet);
    let filter = dates.filter();
    let report = match evaluate(RollupRequest {
        entities: &dataset.entities,
        interactions: &dataset.interactions,
        metrics: &metrics,
        date_filter: filter.as_ref(),
        schema: None,
    }) {
        Ok(r) => r,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "dashboard": board.name,
            "report": report,
        })),
        OutputFormat::Text => {
            println!("dashboard: {}", board.name);
            print_report_text(&report);
        }
    }
}
