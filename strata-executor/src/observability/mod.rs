//! Logging setup for hosts embedding the executors.
//!
//! The executors only emit `tracing` events and spans; installing a
//! subscriber is up to the host. [`init_tracing`] installs a
//! `tracing-subscriber` stack configured from [`TracingConfig`].
//!
//! Output format is controlled via `STRATA_LOG_FORMAT`:
//! - `json` - Structured JSON output, one event per line
//! - `pretty` - Human-readable multi-line output
//! - `compact` - Compact single-line format
//!
//! # Example
//!
//! ```ignore
//! use strata_executor::observability::{TracingConfig, init_tracing};
//!
//! let _guard = init_tracing(&TracingConfig::from_env())?;
//!
//! let config = TracingConfig::default()
//!     .with_format(LogFormat::Json)
//!     .with_filter("info,strata_executor=debug");
//! let _guard = init_tracing(&config)?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::{TracingGuard, init_tracing};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.filter, "info");
        assert!(config.include_target);
        assert!(!config.unit_spans);
    }

    #[test]
    fn builder_methods() {
        let config = TracingConfig::default()
            .with_format(LogFormat::Json)
            .with_filter("debug,strata_executor=trace")
            .with_location(true)
            .with_unit_spans(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "debug,strata_executor=trace");
        assert!(config.include_location);
        assert!(config.unit_spans);
    }

    #[test]
    fn invalid_filter_is_reported() {
        let config = TracingConfig::default().with_filter("strata=verbose");
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid log filter"));
    }
}
