//! Tracing setup.
//!
//! The container only emits `tracing` events; installing a subscriber is
//! the application's call. These helpers cover the common case.

use tracing_subscriber::EnvFilter;

/// Failure to install the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The default directive did not parse.
    #[error("invalid log filter {directive:?}: {source}")]
    InvalidFilter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// Another global subscriber is already installed.
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled,
}

/// Builds the filter: `RUST_LOG` when set, otherwise `default_directive`.
pub fn env_filter(default_directive: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(default_directive).map_err(|source| LoggingError::InvalidFilter {
        directive: default_directive.to_string(),
        source,
    })
}

/// Installs a fmt subscriber as the global default.
///
/// ```no_run
/// wasil_support::logging::init("wasil=debug").expect("logging");
/// ```
pub fn init(default_directive: &str) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive)?)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInstalled)?;

    tracing::debug!(default_directive, "Installed tracing subscriber");
    Ok(())
}

/// Like [`init`] but writes through the test harness capture and ignores a
/// subscriber installed by an earlier test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("wasil=trace"))
        .with_test_writer()
        .try_init();
}
