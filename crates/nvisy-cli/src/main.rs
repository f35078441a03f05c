#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod download_provider;
mod reference_data;
mod shutdown;

use std::process;
use std::time::Duration;

use anyhow::Context;
use nvisy_ingest::{JobScheduler, PgJobRegistry};
use nvisy_postgres::PgClientMigrationExt;
use nvisy_source::SourceClient;
use tokio::time::MissedTickBehavior;

use crate::config::Cli;
use crate::download_provider::PassthroughDownloadUrlProvider;
use crate::reference_data::FileReferenceDataLoader;

/// Tracing target for process startup.
pub const TRACING_TARGET_STARTUP: &str = "nvisy_cli::startup";
/// Tracing target for process shutdown.
pub const TRACING_TARGET_SHUTDOWN: &str = "nvisy_cli::shutdown";
/// Tracing target for configuration logging.
pub const TRACING_TARGET_CONFIG: &str = "nvisy_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(target: TRACING_TARGET_SHUTDOWN, "application terminated successfully");
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
///
/// Connects the durable registry, constructs the scheduler, recovers jobs
/// stranded by a previous crash, then polls for queued work until a
/// shutdown signal arrives.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();
    cli.validate().context("invalid configuration")?;

    let pg_client = cli.postgres.build().context("failed to connect to the database")?;
    pg_client
        .run_pending_migrations()
        .await
        .context("failed to run database migrations")?;

    let registry = PgJobRegistry::new(pg_client);
    let reference_loader = FileReferenceDataLoader::new(cli.reference_data_path.clone());
    let source = SourceClient::new(cli.source.clone()).context("failed to build source client")?;
    let url_provider = PassthroughDownloadUrlProvider;

    let scheduler = JobScheduler::new(registry, reference_loader, source, url_provider, cli.ingest.clone(), cli.validator);

    scheduler.recover_stale_jobs().await.context("startup recovery of stale jobs failed")?;

    let poll_interval = Duration::from_secs(cli.poll_interval_secs);
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        poll_interval_secs = cli.poll_interval_secs,
        max_concurrent_jobs = cli.ingest.max_concurrent_jobs,
        "scheduler running"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                scheduler.auto_dequeue().await;
            }
            () = shutdown::shutdown_signal() => {
                break;
            }
        }
    }

    tracing::info!(target: TRACING_TARGET_SHUTDOWN, "shutdown signal received, cancelling active jobs");
    scheduler.shutdown().await;

    Ok(())
}
