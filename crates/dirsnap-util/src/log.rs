//! Logging setup using tracing.
//!
//! Library crates only emit `tracing` events; binaries call [`init`] once
//! to decide where those events go.

use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Minimum level of events that get emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by [`EnvFilter`].
    pub fn directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// Logging configuration.
pub struct LogConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub level: LogLevel,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_location: false,
            json: false,
        }
    }
}

impl LogConfig {
    /// Config for a `--verbose` run.
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_location: true,
            ..Self::default()
        }
    }
}

/// Initialize logging with the given configuration.
///
/// Events go to stderr so that stdout stays clean for snapshot and diff
/// output. This should be called once at application startup.
pub fn init(config: LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.directive()));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!(" WARNING ".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Error.directive(), "error");
    }

    #[test]
    fn test_log_config_variants() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert!(!config.json);

        let verbose = LogConfig::verbose();
        assert_eq!(verbose.level, LogLevel::Debug);
        assert!(verbose.include_location);
    }
}
