//! catgirl-downloader - one-shot download run
//!
//! Main entry point for the command-line binary.
//!
//! # Execution Flow
//!
//! 1. Load settings: defaults, then `catgirl.yaml`, then `CATGIRL_*` environment variables
//! 2. Initialize logging → logs/catgirl-downloader.<date> (stderr too when verbose)
//! 3. Load provider credentials from the environment
//! 4. Build the provider registry around one shared HTTP client
//! 5. Run on a current-thread tokio runtime; Ctrl-C cancels and keeps the partial summary
//! 6. Print warnings and the summary, exit 0 only if every requested image was downloaded

use anyhow::{Context, Result};
use camino::Utf8Path;
use catgirl_downloader::services::build_http_client;
use catgirl_downloader::{APP_NAME, ConfigManager, DownloadRunner, ProviderRegistry, VERSION};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

fn main() -> Result<ExitCode> {
    let config_manager = ConfigManager::new(".");
    let settings = config_manager.load_settings()?;

    let _log_guard = catgirl_downloader::logging::setup_logging_with_console(
        Utf8Path::new("logs"),
        APP_NAME,
        settings.verbose,
        settings.verbose,
    )?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let credentials = config_manager.load_credentials();
    let client = build_http_client().context("Failed to build HTTP client")?;
    let registry = Arc::new(ProviderRegistry::with_defaults(client, &credentials));

    // The workload is I/O-bound; one thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let runner = DownloadRunner::new(settings, registry)?.with_cancellation(cancel_rx);

    runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling run");
                let _ = cancel_tx.send(true);
            }
        });

        runner.run().await
    });

    for warning in runner.warnings() {
        println!("Warning: {}", warning);
    }

    for result in runner.results() {
        match (result.path(), result.error()) {
            (Some(path), _) => println!(
                "{:<17} {:<10} {}",
                result.status().as_str(),
                result.provider().as_str(),
                path
            ),
            (None, Some(error)) => println!(
                "{:<17} {:<10} {} ({})",
                result.status().as_str(),
                result.provider().as_str(),
                result.url(),
                error
            ),
            (None, None) => println!(
                "{:<17} {:<10} {}",
                result.status().as_str(),
                result.provider().as_str(),
                result.url()
            ),
        }
    }

    let summary = runner.summary();
    println!(
        "Downloaded {}/{} (failed: {}, duplicates: {}) -> {}",
        summary.downloaded,
        summary.requested,
        summary.failed,
        summary.duplicates,
        summary.output_dir
    );

    let exit_code = runner.exit_code();
    tracing::info!("Exiting with code {}", exit_code);
    Ok(ExitCode::from(exit_code as u8))
}
