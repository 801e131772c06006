//! Log subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to
//! every target. Logs always go to stderr so `--output json` stays clean.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

pub fn init_logging(level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (json_layer, text_layer) = match format {
        LogFormat::Json => {
            let json = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr);
            (Some(json), None)
        }
        LogFormat::Text => {
            let text = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr);
            (None, Some(text))
        }
    };

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init();
}
