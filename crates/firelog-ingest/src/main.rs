//! # firelog-ingest
//!
//! Command-line and service entry point for the firewall log pipeline.
//!
//! ## Modes
//!
//! - **Service Mode**: accepts S3 event notifications over HTTP
//! - **CLI Mode**: processes one archive, one event file, or re-exports a day
//!
//! ## Endpoints
//!
//! - `POST /events` - S3 `ObjectCreated` event; processes every record in order
//! - `GET /health` - Shallow liveness check (always 200)
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Usage
//!
//! ```bash
//! # Process one archive
//! firelog-ingest process --container syslog-input --key raw/2025-04-28/10.zip
//!
//! # Process an S3 event document
//! firelog-ingest event --file event.json
//!
//! # Regenerate data/2025-04-28.json from stored aggregates
//! firelog-ingest export --date 2025-04-28
//!
//! # Run as service
//! firelog-ingest serve --port 8080
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use firelog_core::{LogFormat, ObjectStoreBackend, StorageBackend, TimeoutBackend, init_logging};
use firelog_ingest::config::{MalformedRowPolicy, PipelineConfig};
use firelog_ingest::metrics;
use firelog_ingest::notification::{ArchiveRef, EventNotification};
use firelog_ingest::pipeline::InvocationReport;
use firelog_ingest::source::Containers;
use firelog_ingest::store::ObjectAggregateStore;
use firelog_ingest::{ExportStatus, Pipeline};

// ============================================================================
// CLI Arguments
// ============================================================================

/// Firewall log ingestion and hourly aggregation.
#[derive(Debug, Parser)]
#[command(name = "firelog-ingest")]
#[command(about = "Aggregates firewall log archives into hourly severity counts")]
#[command(version)]
struct Args {
    /// Base URL resolving trigger containers (`s3:`, `file:///dir`, `memory://`).
    #[arg(long, env = "FIRELOG_SOURCE_URL", default_value = "file://./var/input", global = true)]
    source_url: String,

    /// Storage URL for hourly aggregates.
    #[arg(
        long,
        env = "FIRELOG_AGGREGATE_URL",
        default_value = "file://./var/aggregates",
        global = true
    )]
    aggregate_url: String,

    /// Storage URL receiving day exports.
    #[arg(long, env = "FIRELOG_OUTPUT_URL", default_value = "file://./var/output", global = true)]
    output_url: String,

    /// Handling of malformed rows (`abort` or `skip`).
    #[arg(long, env = "FIRELOG_MALFORMED_ROWS", default_value = "abort", global = true)]
    malformed_rows: MalformedRowPolicy,

    /// Directory in the output store receiving `{date}.json`.
    #[arg(long, env = "FIRELOG_EXPORT_PREFIX", default_value = "data", global = true)]
    export_prefix: String,

    /// Skip the day export after committing aggregates.
    #[arg(long, env = "FIRELOG_NO_EXPORT", global = true)]
    no_export: bool,

    /// Log output format (`json` or `pretty`).
    #[arg(long, env = "FIRELOG_LOG_FORMAT", default_value = "pretty", global = true)]
    log_format: LogFormat,

    /// Deadline for each storage call, in seconds.
    #[arg(long, env = "FIRELOG_IO_TIMEOUT_SECS", default_value = "30", global = true)]
    io_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Process a single archive.
    Process {
        /// Container (bucket) holding the archive.
        #[arg(long)]
        container: String,

        /// Object key of the archive.
        #[arg(long)]
        key: String,
    },

    /// Process every archive named by an S3 event document.
    Event {
        /// Path to the event JSON; `-` reads stdin.
        #[arg(long, default_value = "-")]
        file: PathBuf,
    },

    /// Regenerate the day export for a date from stored aggregates.
    Export {
        /// Date to export (`YYYY-MM-DD`).
        #[arg(long)]
        date: NaiveDate,

        /// Host to record in the export; defaults to the stored one.
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Run as a service accepting event notifications.
    Serve {
        /// HTTP port.
        #[arg(long, env = "FIRELOG_PORT", default_value = "8080")]
        port: u16,
    },
}

impl Args {
    fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            malformed_rows: self.malformed_rows,
            export_prefix: self.export_prefix.clone(),
            export_enabled: !self.no_export,
            ..PipelineConfig::default()
        }
    }

    fn open_store(&self, url: &str) -> Result<Arc<dyn StorageBackend>> {
        let backend = ObjectStoreBackend::from_url(url)
            .with_context(|| format!("failed to open storage at {url}"))?;
        tracing::info!(url = backend.description(), "storage opened");
        Ok(Arc::new(TimeoutBackend::new(backend, self.io_timeout())))
    }

    fn build_pipeline(&self) -> Result<Pipeline> {
        if self.io_timeout_secs == 0 {
            bail!("--io-timeout-secs must be positive");
        }
        let source =
            Containers::from_base_url(self.source_url.clone()).with_timeout(self.io_timeout());
        let store = ObjectAggregateStore::new(self.open_store(&self.aggregate_url)?);
        let sink = self.open_store(&self.output_url)?;
        Ok(Pipeline::new(
            Arc::new(source),
            Arc::new(store),
            sink,
            self.pipeline_config(),
        ))
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
}

/// GET /health - Shallow liveness check.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /metrics - Prometheus text exposition.
async fn serve_metrics() -> impl IntoResponse {
    match metrics::prometheus_handle() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [("content-type", "text/plain; charset=utf-8")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// POST /events - Process an S3 event notification.
///
/// Returns:
/// - `200 OK` with one report per archive
/// - `400 Bad Request` if the body is not a usable event
/// - `404 Not Found` if an archive does not exist
/// - `500 Internal Server Error` on any other hard failure
async fn handle_event(State(pipeline): State<Arc<Pipeline>>, body: Bytes) -> impl IntoResponse {
    let notification = match EventNotification::from_s3_event(&body) {
        Ok(notification) => notification,
        Err(e) => {
            tracing::warn!(error = %e, "rejected event");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "invalid_event", "message": e.to_string() })),
            );
        }
    };

    match pipeline.process_notification(&notification).await {
        Ok(outcomes) => {
            let reports: Vec<InvocationReport> = outcomes.iter().map(|o| o.report()).collect();
            (StatusCode::OK, Json(serde_json::json!({ "results": reports })))
        }
        Err(e) => {
            let status = if e.source.is_not_found() {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                Json(serde_json::json!({
                    "error": e.stage.as_str(),
                    "archive": e.archive,
                    "message": e.source.to_string(),
                })),
            )
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_event(file: &Path) -> Result<Vec<u8>> {
    if file.as_os_str() == "-" {
        let mut body = Vec::new();
        std::io::Read::read_to_end(&mut std::io::stdin(), &mut body)
            .context("failed to read event from stdin")?;
        Ok(body)
    } else {
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    let pipeline = args.build_pipeline()?;

    match &args.command {
        Commands::Process { container, key } => {
            let outcome = pipeline.process(&ArchiveRef::new(container, key)).await?;
            print_json(&outcome.report())?;
        }

        Commands::Event { file } => {
            let body = read_event(file)?;
            let notification = EventNotification::from_s3_event(&body)?;
            let outcomes = pipeline.process_notification(&notification).await?;
            let reports: Vec<InvocationReport> = outcomes.iter().map(|o| o.report()).collect();
            print_json(&reports)?;
        }

        Commands::Export { date, hostname } => {
            let date = date.format("%Y-%m-%d").to_string();
            let status = pipeline
                .export_day(&date, hostname.as_deref(), Utc::now())
                .await;
            print_json(&status)?;
            if let ExportStatus::Failed { error } = status {
                bail!("export for {date} failed: {error}");
            }
        }

        Commands::Serve { port } => {
            metrics::init_metrics().context("failed to install metrics recorder")?;

            tracing::info!(
                port = port,
                source_url = %args.source_url,
                malformed_rows = %args.malformed_rows,
                "Starting firelog service"
            );

            let router = Router::new()
                .route("/health", get(health))
                .route("/metrics", get(serve_metrics))
                .route("/events", post(handle_event))
                .with_state(Arc::new(pipeline));

            let addr = SocketAddr::from(([0, 0, 0, 0], *port));
            tracing::info!(address = %addr, "Starting HTTP server");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }
    }

    Ok(())
}
