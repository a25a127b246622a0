//! Logging initialization
//!
//! Priority for the filter directive:
//! 1. `RUST_LOG` environment variable
//! 2. `--verbose` (debug for this crate)
//! 3. `[logging].level` from configuration

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};

fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("proctools=debug")
        } else {
            EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    })
}

/// Try to install the global subscriber writing to stderr.
///
/// Returns `Err` if a subscriber is already installed.
pub fn try_init(
    config: &LoggingConfig,
    verbose: bool,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let fmt_layer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(config, verbose))
        .with(fmt_layer)
        .try_init()
}
