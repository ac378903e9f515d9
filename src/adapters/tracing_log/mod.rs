// Tracing log adapter - Subscriber setup for structured logging

use tracing_subscriber::EnvFilter;

use crate::error::ReelgenError;

/// Logging options resolved from configuration and flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Default filter directive, e.g. `info` or `reelgen=debug`
    pub level: String,
    /// Emit one JSON object per event
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Build the event filter; `RUST_LOG` wins over the configured level
pub fn env_filter(options: &LogOptions) -> Result<EnvFilter, ReelgenError> {
    match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&options.level),
    }
    .map_err(|e| {
        ReelgenError::Config(format!("invalid log level '{}': {}", options.level, e))
    })
}

/// Install the global subscriber.
///
/// Logs go to stderr so stdout stays reserved for command output. A second
/// call is a no-op.
pub fn init(options: &LogOptions) -> Result<(), ReelgenError> {
    let filter = env_filter(options)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = if options.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    Ok(())
}
