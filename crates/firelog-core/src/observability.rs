//! Observability infrastructure for firelog.
//!
//! Structured logging with consistent spans. Every pipeline invocation runs
//! inside a [`pipeline_span`] so log lines carry the archive being processed.

use std::str::FromStr;
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else if value.eq_ignore_ascii_case("pretty") {
            Ok(Self::Pretty)
        } else {
            Err(format!("unknown log format '{value}' (expected json or pretty)"))
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `firelog_ingest=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates the span wrapping one pipeline invocation.
///
/// # Example
///
/// ```rust
/// use firelog_core::observability::pipeline_span;
///
/// let span = pipeline_span("syslog-input", "raw/2025-04-28/10.zip");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn pipeline_span(container: &str, key: &str) -> Span {
    tracing::info_span!("pipeline", container = container, key = key)
}

/// Creates a span for a standalone day export.
#[must_use]
pub fn export_span(date: &str) -> Span {
    tracing::info_span!("export", log_date = date)
}
