//! Tracing setup for the Libris binaries.
//!
//! Everything logs to stderr. Stdout belongs to the CLI's data output
//! (answers, `--json` payloads), so the two streams must never mix.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

/// Install the global tracing subscriber.
///
/// Filter resolution order: explicit `log_level` argument (CLI flag or
/// config file), then `RUST_LOG`, then "info". Colors are suppressed when
/// `no_color` is set or the `NO_COLOR` environment variable is present.
///
/// May only be called once per process; a second call fails with
/// `AppError::Config`.
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", level, e)))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let ansi = !no_color && std::env::var("NO_COLOR").is_err();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(ansi);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        let result = init_logging(Some("not a [valid] directive!!"), true);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_init_logging_once() {
        // The global subscriber may already be installed by another test;
        // either outcome is well-formed.
        let first = init_logging(Some("info"), true);
        let second = init_logging(Some("info"), true);
        assert!(first.is_ok() || second.is_err());
    }
}
