//! Tracing configuration.

use std::env;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Configuration for [`init_tracing`](super::init_tracing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `"info,strata_executor=debug"`.
    pub filter: String,
    /// Include source file and line.
    pub include_location: bool,
    /// Include the event target.
    pub include_target: bool,
    /// Include thread names.
    pub include_thread_names: bool,
    /// Log an event when each `unit_execution` span closes, with its timing.
    pub unit_spans: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: "info".to_string(),
            include_location: false,
            include_target: true,
            include_thread_names: false,
            unit_spans: false,
        }
    }
}

impl TracingConfig {
    /// Create configuration from environment variables.
    ///
    /// - `STRATA_LOG_FORMAT`: "json", "pretty", or "compact". When unset,
    ///   pretty on a terminal and JSON otherwise.
    /// - `STRATA_LOG_LEVEL` or `RUST_LOG`: filter directives
    /// - `STRATA_LOG_LOCATION`: "true" or "1" to include source locations
    /// - `STRATA_LOG_THREAD_NAMES`: "true" or "1" to include thread names
    /// - `STRATA_LOG_UNIT_SPANS`: "true" or "1" to log unit span timings
    pub fn from_env() -> Self {
        let format = env::var("STRATA_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or_else(|| {
                if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
                    LogFormat::Pretty
                } else {
                    LogFormat::Json
                }
            });

        let filter = env::var("STRATA_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            format,
            filter,
            include_location: env_flag("STRATA_LOG_LOCATION"),
            include_target: true,
            include_thread_names: env_flag("STRATA_LOG_THREAD_NAMES"),
            unit_spans: env_flag("STRATA_LOG_UNIT_SPANS"),
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Include source locations.
    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    /// Include thread names.
    pub fn with_thread_names(mut self, include: bool) -> Self {
        self.include_thread_names = include;
        self
    }

    /// Log unit span timings.
    pub fn with_unit_spans(mut self, enable: bool) -> Self {
        self.unit_spans = enable;
        self
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
        .unwrap_or(false)
}
