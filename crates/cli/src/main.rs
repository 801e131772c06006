mod commands;
mod config;
mod serve;
mod telemetry;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crm_eval::CalendarDate;

use crate::commands::DateArgs;
use crate::config::{CrmConfig, LogFormat};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// CRM latest-interaction resolver and metric rollups.
#[derive(Parser)]
#[command(
    name = "crm",
    version,
    about = "CRM latest-interaction resolver and metric rollups"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the latest interaction for every entity
    Latest {
        /// JSON array of interactions, or a dataset file
        file: PathBuf,
    },

    /// Count entities per metric over a dataset
    Rollup {
        /// Dataset JSON: {"entities": [...], "interactions": [...]}
        dataset: PathBuf,
        /// Metric set JSON
        #[arg(long)]
        metrics: PathBuf,
        /// Known columns JSON: {"entity_fields": [...], "interaction_fields": [...]}
        #[arg(long)]
        schema: Option<PathBuf>,
        /// First day of the date filter (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<CalendarDate>,
        /// Last day of the date filter (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<CalendarDate>,
        /// Interaction column the date filter reads
        #[arg(long)]
        date_field: Option<String>,
        /// Comma-separated metric names to report
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },

    /// Run a built-in dashboard (leadgen, fse, franchise) over a dataset
    Dashboard {
        /// Dataset JSON: {"entities": [...], "interactions": [...]}
        dataset: PathBuf,
        /// Dashboard name
        #[arg(long)]
        preset: String,
        /// First day of the date filter (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<CalendarDate>,
        /// Last day of the date filter (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<CalendarDate>,
        /// Comma-separated metric names to report
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
    },

    /// Start the HTTP API server
    Serve {
        /// Path to crm.toml
        #[arg(long)]
        config: Option<PathBuf>,
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
        /// Dataset JSON to serve (overrides config)
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Latest { file } => {
            init_cli_logging(cli.quiet);
            commands::cmd_latest(&file, cli.output, cli.quiet);
        }
        Commands::Rollup {
            dataset,
            metrics,
            schema,
            from,
            to,
            date_field,
            select,
        } => {
            init_cli_logging(cli.quiet);
            let dates = DateArgs {
                from,
                to,
                field: date_field,
            };
            commands::cmd_rollup(
                &dataset,
                &metrics,
                schema.as_deref(),
                &dates,
                &select,
                cli.output,
                cli.quiet,
            );
        }
        Commands::Dashboard {
            dataset,
            preset,
            from,
            to,
            select,
        } => {
            init_cli_logging(cli.quiet);
            let dates = DateArgs {
                from,
                to,
                field: None,
            };
            commands::cmd_dashboard(&dataset, &preset, &dates, &select, cli.output, cli.quiet);
        }
        Commands::Serve { config, port, data } => {
            let mut cfg = match CrmConfig::load(config.as_deref()) {
                Ok(c) => c,
                Err(e) => {
                    report_error(&format!("error: {}", e), cli.output, cli.quiet);
                    process::exit(1);
                }
            };
            if let Some(p) = port {
                cfg.server.port = p;
            }
            if let Some(d) = data {
                cfg.data.path = Some(d);
            }
            if let Err(e) = cfg.validate() {
                report_error(&format!("error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
            telemetry::init_logging(&cfg.server.log_level, cfg.server.log_format);

            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    report_error(
                        &format!("error: failed to start runtime: {}", e),
                        cli.output,
                        cli.quiet,
                    );
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(cfg)) {
                report_error(&format!("server error: {}", e), cli.output, cli.quiet);
                process::exit(1);
            }
        }
    }
}

/// One-shot commands log warnings and up to stderr unless `RUST_LOG` says
/// otherwise.
fn init_cli_logging(quiet: bool) {
    let level = if quiet { "error" } else { "warn" };
    telemetry::init_logging(level, LogFormat::Text);
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
