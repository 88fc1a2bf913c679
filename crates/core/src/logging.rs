//! Structured logging infrastructure for authring hosts.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use authring_core::logging;
///
/// logging::init();
/// tracing::info!("Authring host started");
/// ```
pub fn init() {
    init_with(&LoggingConfig::default());
}

/// Initialize the logging system with JSON output for production environments.
///
/// # Example
/// ```no_run
/// use authring_core::logging;
///
/// logging::init_json();
/// tracing::info!(key_type = "Ed25519", "Ring loaded");
/// ```
pub fn init_json() {
    init_with(&LoggingConfig {
        format: LogFormat::Json,
        ..LoggingConfig::default()
    });
}

/// Initialize logging from a [`LoggingConfig`].
///
/// `RUST_LOG` still takes precedence over the configured level.
pub fn init_with(config: &LoggingConfig) {
    let filter = build_filter(&config.level);
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init(),
    }
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
