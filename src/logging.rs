// SPDX-License-Identifier: MPL-2.0

use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Install a global fmt subscriber for host applications.
/// `level` is the default filter, still overridable via RUST_LOG.
pub fn init_logging(level: &str) -> Result<(), LoggingError> {
    let default = format!("{level},photofeed={level}");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}
