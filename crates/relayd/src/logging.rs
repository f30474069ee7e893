//! Tracing subscriber setup.
//!
//! The daemon logs through `tracing` macros only. This module builds the
//! subscriber in the configured format and installs it once as the global
//! default. `RUST_LOG` directives refine the configured level
//! (e.g. `RUST_LOG=relayd::session=debug`).
//!
//! Everything the daemon does runs inside [`service_span`], so each event
//! carries the `service` field.

use thiserror::Error;
use tracing::{Span, Subscriber};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogLevel, SERVICE_NAME};

/// Errors that can occur while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

/// Builds the filter: configured level as default, refined by `RUST_LOG`.
pub fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.as_level_filter().into())
        .from_env_lossy()
}

/// Builds a subscriber writing to stderr in `format`.
pub fn subscriber(level: LogLevel, format: LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let filter = env_filter(level);

    match format {
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(false)
                .with_writer(std::io::stderr)
                .finish(),
        ),
        LogFormat::Logfmt => Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish(),
        ),
    }
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns `LoggingError::Init` if a global subscriber is already set.
pub fn init(level: LogLevel, format: LogFormat) -> Result<(), LoggingError> {
    tracing::subscriber::set_global_default(subscriber(level, format))
        .map_err(|e| LoggingError::Init(e.to_string()))
}

/// Root span for the daemon. Must be created after [`init`].
pub fn service_span() -> Span {
    tracing::info_span!("relayd", service = SERVICE_NAME)
}
