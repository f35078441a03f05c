//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── ingest: IngestConfig        # Concurrency, fragment size, heartbeats
//! ├── validator: ValidatorConfig  # Per-source column layout
//! ├── postgres: PgConfig          # Durable job registry connection
//! └── source: SourceConfig        # Remote HTTP streaming source
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! nvisy-cli --postgres-url "postgresql://..." --min-columns 5 \
//!     --currency-field 0 --province-field 1 --product-field 2
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use nvisy_ingest::{IngestConfig, ValidatorConfig};
use nvisy_postgres::PgConfig;
use nvisy_source::SourceConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::TRACING_TARGET_CONFIG;

/// Complete CLI configuration.
///
/// Combines every configuration group the hosting process needs to wire up
/// a [`nvisy_ingest::JobScheduler`]: the pipeline's own tunables plus its
/// external collaborators' connection settings.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "nvisy-ingest")]
#[command(about = "Streaming fragment processor for large delimited source files")]
#[command(version)]
pub struct Cli {
    /// Ingestion pipeline tunables (concurrency, fragment size, heartbeats).
    #[clap(flatten)]
    pub ingest: IngestConfig,

    /// Per-source line layout consumed by the default validator.
    #[clap(flatten)]
    pub validator: ValidatorConfig,

    /// Durable job registry connection.
    #[clap(flatten)]
    pub postgres: PgConfig,

    /// Remote HTTP streaming source client settings.
    #[clap(flatten)]
    pub source: SourceConfig,

    /// Path to a JSON file of `{"category": ["allowed", "values"]}` used to
    /// build the reference data snapshot loaded at the start of every job.
    /// When omitted, no referential constraints are enforced.
    #[arg(long = "reference-data-path", env = "REFERENCE_DATA_PATH")]
    pub reference_data_path: Option<PathBuf>,

    /// Cadence, in seconds, at which the scheduler polls the registry for
    /// queued work.
    #[arg(long = "poll-interval-secs", env = "POLL_INTERVAL_SECS", default_value_t = 5)]
    pub poll_interval_secs: u64,
}

impl Cli {
    /// Loads environment variables from `.env` (if enabled) and parses CLI
    /// arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from a `.env` file if the `dotenv`
    /// feature is enabled. Must run before [`clap::Parser::parse`] so its
    /// `env` attributes can pick up values from the file.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "build information"
        );
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.ingest.validate().context("invalid ingest configuration")?;
        self.postgres.validate().context("invalid postgres configuration")?;
        self.source.validate().context("invalid source configuration")?;
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        Ok(())
    }

    /// Logs configuration at debug/info level (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            max_concurrent_jobs = self.ingest.max_concurrent_jobs,
            num_workers = self.ingest.num_workers,
            fragment_max_bytes = self.ingest.fragment_max_bytes,
            poll_interval_secs = self.poll_interval_secs,
            "ingest configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            postgres_url = %self.postgres.database_url_masked(),
            postgres_max_connections = self.postgres.postgres_max_connections,
            "database configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            reference_data_path = ?self.reference_data_path,
            "reference data configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "otel").then_some("otel"),
            cfg!(feature = "dotenv").then_some("dotenv"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
