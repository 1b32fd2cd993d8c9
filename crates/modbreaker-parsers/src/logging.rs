// modbreaker-parsers/src/logging.rs
//! Logging and tracing utilities for ModBreaker parsers
//!
//! Parsers themselves only emit `debug!`/`trace!` events; installing a
//! subscriber is left to the binary (or to a test that wants output).

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize tracing with a custom configuration
#[cfg(feature = "tracing")]
pub fn init_with_config(config: TracingConfig) {
    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_ok()
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number);

        // A subscriber installed elsewhere (e.g. by a test harness) wins
        let _ = tracing_subscriber::registry().with(fmt_layer).with(filter).try_init();
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info", "debug", "warn")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show thread IDs in log output
    pub show_thread_ids: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: "warn,modbreaker=info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

impl TracingConfig {
    /// Filter for a `-v` count: 0 warn, 1 info, 2 debug, 3+ trace
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            default_level: level.to_string(),
            show_thread_ids: verbose >= 3,
            ..Self::default()
        }
    }
}

/// Log a failed parse of one payload without aborting the caller
#[macro_export]
macro_rules! log_parse_error {
    ($parser:expr, $path:expr, $error:expr) => {
        tracing::warn!(
            parser = %$parser,
            path = %$path,
            error = %$error,
            "Parse failed"
        );
    };
}

/// Instrument a parsing operation with timing
#[cfg(feature = "tracing")]
pub fn instrument_parse<T, F>(name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let span = tracing::debug_span!("parse", parser = %name);
    let _guard = span.enter();

    let start = std::time::Instant::now();
    let result = f();
    let duration = start.elapsed();

    tracing::trace!(duration_us = %duration.as_micros(), "Parse operation complete");

    result
}

#[cfg(not(feature = "tracing"))]
pub fn instrument_parse<T, F>(_name: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    f()
}

/// Log progress within a large operation
#[cfg(feature = "tracing")]
pub fn log_progress(operation: &str, current: usize, total: usize) {
    if total > 0 && (current % 100 == 0 || current == total) {
        let percent = (current as f64 / total as f64 * 100.0) as u32;
        tracing::debug!(operation, current, total, percent, "Progress");
    }
}

#[cfg(not(feature = "tracing"))]
pub fn log_progress(_operation: &str, _current: usize, _total: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert!(config.default_level.contains("modbreaker=info"));
        assert!(config.show_target);
        assert!(!config.show_thread_ids);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(TracingConfig::from_verbosity(0).default_level, "warn");
        assert_eq!(TracingConfig::from_verbosity(2).default_level, "debug");
        assert_eq!(TracingConfig::from_verbosity(9).default_level, "trace");
    }

    #[test]
    fn test_instrument_parse() {
        let result = instrument_parse("test", || 42);
        assert_eq!(result, 42);
        log_progress("test", 0, 0);
    }
}
