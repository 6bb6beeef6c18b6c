//! # Log levels and subscriber installation.
//!
//! flowkit emits diagnostics through [`tracing`]. The [`Cron`](crate::Cron)
//! scheduler logs its lifecycle (`info`) and job bookkeeping (`debug`); the
//! [`CircuitBreaker`](crate::CircuitBreaker) logs state changes at `debug`.
//! Normal error returns are never logged.
//!
//! [`LogLevel`] models the six levels callers configure by name:
//!
//! ```text
//! "debug" → DEBUG     "error" → ERROR
//! "info"  → INFO      "fatal" → ERROR
//! "warn"  → WARN      "panic" → ERROR
//! anything else → DEBUG (plus a warning)
//! ```
//!
//! With the `logging` feature, [`init`] installs a `tracing_subscriber::fmt`
//! subscriber (demo/reference only; applications usually install their own).

use std::fmt;

/// Named logging level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Verbose diagnostics.
    #[default]
    Debug,
    /// Lifecycle events.
    Info,
    /// Recoverable anomalies.
    Warn,
    /// Failures.
    Error,
    /// Failures after which the process is expected to exit.
    Fatal,
    /// Failures after which the caller is expected to unwind.
    Panic,
}

impl LogLevel {
    /// Parses a level name, case-insensitively.
    ///
    /// Unknown names fall back to [`LogLevel::Debug`] and emit a warning.
    ///
    /// # Example
    /// ```
    /// use flowkit::LogLevel;
    ///
    /// assert_eq!(LogLevel::parse_lossy("WARN"), LogLevel::Warn);
    /// assert_eq!(LogLevel::parse_lossy("verbose"), LogLevel::Debug);
    /// ```
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "fatal" => LogLevel::Fatal,
            "panic" => LogLevel::Panic,
            other => {
                tracing::warn!(level = other, "unknown log level, defaulting to debug");
                LogLevel::Debug
            }
        }
    }

    /// Returns the `tracing` level this name maps to.
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Fatal | LogLevel::Panic => tracing::Level::ERROR,
        }
    }

    /// Returns the lowercase level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
            LogLevel::Panic => "panic",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs a global `fmt` subscriber filtered at `level`.
///
/// `RUST_LOG`, when set, takes precedence over `level`. Fails (instead of
/// panicking) if a global subscriber is already installed.
#[cfg(feature = "logging")]
pub fn init(level: LogLevel) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_tracing().as_str().to_ascii_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_levels() {
        for (name, level) in [
            ("debug", LogLevel::Debug),
            ("Info", LogLevel::Info),
            ("warning", LogLevel::Warn),
            ("ERROR", LogLevel::Error),
            ("fatal", LogLevel::Fatal),
            (" panic ", LogLevel::Panic),
        ] {
            assert_eq!(LogLevel::parse_lossy(name), level, "name {name:?}");
        }
    }

    #[test]
    fn test_unknown_level_defaults_to_debug() {
        assert_eq!(LogLevel::parse_lossy("trace-ish"), LogLevel::Debug);
        assert_eq!(LogLevel::parse_lossy(""), LogLevel::Debug);
    }

    #[test]
    fn test_fatal_and_panic_map_to_error() {
        assert_eq!(LogLevel::Fatal.as_tracing(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Panic.as_tracing(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Warn.as_tracing(), tracing::Level::WARN);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for level in [LogLevel::Info, LogLevel::Fatal] {
            assert_eq!(LogLevel::parse_lossy(&level.to_string()), level);
        }
    }
}
