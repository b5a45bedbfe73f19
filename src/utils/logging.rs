//! Logging utilities
//!
//! Provides simple logging initialization that:
//! - Respects RUST_LOG environment variable
//! - Allows configuration via config file
//! - Writes to stderr, since stdout carries the framework adapter's traffic
//!
//! # Usage
//! ```rust,ignore
//! use hkisy_node::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::async_helpers::panic_message;

/// Build the filter: RUST_LOG wins, then the config filter, then "info"
fn build_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or("info"))
}

/// Initialize logging for the node server
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g., "info", "hkisy_node=debug").
///              If None, uses RUST_LOG environment variable or defaults to "info"
pub fn init_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true) // Bridge output is tagged with its own target
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()), // Respect NO_COLOR standard
        )
        .with(build_filter(filter))
        .init();
}

/// Initialize logging with JSON output (for production/monitoring)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .init();
}

/// Initialize logging from the node server's LoggingConfig
///
/// `override_filter` (e.g. from the command line) beats the config filter;
/// RUST_LOG beats both.
pub fn init_logging_from_config(
    config: Option<&crate::config::LoggingConfig>,
    override_filter: Option<&str>,
) {
    let filter = override_filter.or_else(|| config.and_then(|c| c.filter.as_deref()));

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            // Fall back to regular logging if json-logging feature not enabled
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}

/// Route panics through tracing
///
/// Panics inside handler tasks are already caught by
/// [`spawn_logged`](crate::utils::spawn_logged); this hook makes sure any other
/// panic still reaches the log before the default behaviour applies.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        tracing::error!(
            "Uncaught panic at {}: {}",
            location,
            panic_message(info.payload())
        );
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_filter_parses() {
        // Initialization itself would conflict with other tests; only the
        // filter construction is checked here.
        let filter = build_filter(Some("hkisy_node=debug"));
        if std::env::var("RUST_LOG").is_err() {
            assert!(filter.to_string().contains("hkisy_node=debug"));
        }
    }
}
