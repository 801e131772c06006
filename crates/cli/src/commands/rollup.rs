use std::path::Path;
use std::process;

use crm_eval::{evaluate, MetricSet, RollupRequest, Schema};

use super::{load_dataset, print_json, print_report_text, read_json, DateArgs};
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_rollup(
    dataset_path: &Path,
    metrics_path: &Path,
    schema_path: Option<&Path>,
    dates: &DateArgs,
    select: &[String],
    output: OutputFormat,
    quiet: bool,
) {
    let dataset = load_dataset(dataset_path, output, quiet);
    let mut metrics: MetricSet = read_json(metrics_path, output, quiet);
    let schema: Option<Schema> = schema_path.map(|p| read_json(p, output, quiet));

    if !select.is_empty() {
        metrics = match metrics.restrict(select) {
            Ok(m) => m,
            Err(e) => {
                report_error(&format!("error: {}", e), output, quiet);
                process::exit(1);
            }
        };
    }

    let filter = dates.filter();
    let report = match evaluate(RollupRequest {
        entities: &dataset.entities,
        interactions: &dataset.interactions,
        metrics: &metrics,
        date_filter: filter.as_ref(),
        schema: schema.as_ref(),
    }) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(kind = e.kind(), error = %e, "rollup rejected");
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => print_report_text(&report),
    }
}
