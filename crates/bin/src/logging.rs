//! Logging setup.
//!
//! Events go to stderr so tables and JSON on stdout stay clean. `RUST_LOG`
//! overrides the filter entirely.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// HTTP and TLS crates pinned to `warn`.
const NOISY_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per event
    Json,
}

fn directives(log_level: &str) -> String {
    let mut directives = String::from(log_level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }
    directives
}

fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(log_level)))
}

/// Install the global subscriber.
pub(crate) fn init_logging(log_level: &str, format: LogFormat) {
    let subscriber = tracing_subscriber::registry().with(build_filter(log_level));

    match format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr);
            let _ = subscriber.with(layer).try_init();
        }
        LogFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = subscriber.with(layer).try_init();
        }
    }
}
