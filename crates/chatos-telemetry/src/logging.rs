//! `tracing-subscriber` setup driven by [`LogConfig`].

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TelemetryError, TelemetryResult};

/// Output formatting for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, colored when attached to a terminal.
    #[default]
    Pretty,
    /// Newline-delimited JSON, one object per event.
    Json,
}

/// Logging configuration resolved once at process startup.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base `EnvFilter` directive (e.g. `"info"`, `"debug"`).
    directive: String,
    /// Output format.
    format: LogFormat,
}

impl LogConfig {
    /// Start from a base directive string (`RUST_LOG`/`SUBAGENT_LOG` syntax).
    #[must_use]
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            directive: directive.into(),
            format: LogFormat::default(),
        }
    }

    /// Select the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Append an additional per-crate directive (e.g. `"chatos_mcp=trace"`).
    #[must_use]
    pub fn with_directive(mut self, directive: &str) -> Self {
        if self.directive.is_empty() {
            self.directive = directive.to_string();
        } else {
            self.directive.push(',');
            self.directive.push_str(directive);
        }
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

/// Install the process-wide `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed (callers
/// must invoke this exactly once, at the start of `main`).
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = EnvFilter::try_new(&config.directive)
        .map_err(|e| TelemetryError::ConfigError(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };

    result.map_err(|e| TelemetryError::InitError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_directive_appends() {
        let config = LogConfig::new("info").with_directive("chatos_mcp=trace");
        assert_eq!(config.directive, "info,chatos_mcp=trace");
    }

    #[test]
    fn with_directive_on_empty_base() {
        let config = LogConfig::new("").with_directive("chatos_mcp=trace");
        assert_eq!(config.directive, "chatos_mcp=trace");
    }

    #[test]
    fn default_is_pretty_info() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.directive, "info");
    }
}
