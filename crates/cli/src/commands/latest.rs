use std::path::Path;
use std::process;

use serde_json::Value;

use crm_core::{resolve_latest, Interaction};
use crm_storage::{Dataset, StorageError};

use super::{print_json, read_json};
use crate::{report_error, OutputFormat};

/// Accepts a bare array of interactions or a full dataset file.
pub(crate) fn cmd_latest(path: &Path, output: OutputFormat, quiet: bool) {
    let value: Value = read_json(path, output, quiet);
    let parsed = if value.is_array() {
        serde_json::from_value::<Vec<Interaction>>(value).map_err(StorageError::from)
    } else {
        Dataset::from_value(value).map(|d| d.interactions)
    };
    let interactions = match parsed {
        Ok(rows) => rows,
        Err(e) => {
            report_error(
                &format!("error: invalid interactions in {}: {}", path.display(), e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    let latest = resolve_latest(&interactions);
    tracing::debug!(
        interactions = interactions.len(),
        entities = latest.len(),
        "resolved latest interactions"
    );

    match output {
        OutputFormat::Json => print_json(&latest),
        OutputFormat::Text => {
            for (entity, i) in &latest {
                let when = match &i.occurred_on {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => "(no date)".to_string(),
                    Some(other) => other.to_string(),
                };
                let status = i
                    .field("status")
                    .and_then(Value::as_str)
                    .unwrap_or("-");
                println!("{}  {}  {}  {}", entity, i.id, when, status);
            }
        }
    }
}
