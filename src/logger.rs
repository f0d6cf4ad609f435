//! Tracing setup for the server.
//!
//! The filter comes from one of two places: the `[app] log_level` value
//! (already replaced by `VILUX_LOG_LEVEL` when that is set) or `RUST_LOG`.
//! An explicit `VILUX_LOG_LEVEL` beats `RUST_LOG`; otherwise `RUST_LOG` beats
//! the config file. Output goes to stderr.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Install the global subscriber. `forced` is true when the level came from
/// `VILUX_LOG_LEVEL`.
pub fn init(level: &str, forced: bool) -> Result<(), AppError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(level, forced, rust_log.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// Pick the filter directives. The preferred source is tried first and the
/// other one only if it is missing or does not parse.
fn build_filter(level: &str, forced: bool, rust_log: Option<&str>) -> Result<EnvFilter, AppError> {
    let from_level = || EnvFilter::try_new(level).map_err(|e| format!("log level '{level}': {e}"));
    let from_env = || match rust_log {
        Some(directives) => EnvFilter::try_new(directives).map_err(|e| format!("RUST_LOG '{directives}': {e}")),
        None => Err("RUST_LOG not set".to_string()),
    };

    let filter = if forced {
        from_level().or_else(|a| from_env().map_err(|b| format!("{a}; {b}")))
    } else {
        from_env().or_else(|a| from_level().map_err(|b| format!("{a}; {b}")))
    };
    filter.map_err(AppError::Logger)
}
