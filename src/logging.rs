// src/logging.rs
use is_terminal::IsTerminal;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the `--debug` default. Calling this twice is harmless;
/// the second install is ignored.
pub fn init_logging(format: LogFormat, debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = match format {
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
        LogFormat::Text => builder
            .with_ansi(std::io::stderr().is_terminal())
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("logging already initialised");
    }
}
