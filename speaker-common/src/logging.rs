//! Tracing subscriber setup
//!
//! `RUST_LOG` always wins over the configured level so a single run can be
//! made more verbose without editing the config file.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, otherwise `<crate_target>=<level>` plus
/// `<level>` for everything else.
pub fn build_filter(config: &LoggingConfig, crate_target: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},{crate_target}={level}",
            level = config.level
        ))
    })
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr, or are appended to `config.file` when set.
pub fn init(config: &LoggingConfig, crate_target: &str) -> Result<()> {
    let filter = build_filter(config, crate_target);
    let registry = tracing_subscriber::registry().with(filter);

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .map_err(|e| Error::Logging(e.to_string()))
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Logging(e.to_string())),
    }
}
