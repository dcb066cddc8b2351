//! One download run: acquire candidates, dedup, truncate, download, summarize.

use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};

use super::dedup::dedupe_candidates;
use super::downloader::{DownloadOptions, Downloader, cancelled};
use super::providers::{FetchRequest, Provider};
use super::registry::ProviderRegistry;
use super::retry::RetryPolicy;
use crate::metrics::DownloadMetrics;
use crate::models::{
    DownloadResult, DownloadSummary, ProviderChoice, RemoteImage, RunSettings, SettingsError,
};
use crate::state::{RunEvent, RunPhase, RunStateManager};

/// Errors that prevent a run from being set up. A started run never fails.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Drives a single run and keeps its results, warnings and summary.
pub struct DownloadRunner {
    settings: RunSettings,
    registry: Arc<ProviderRegistry>,
    downloader: Downloader,
    state: RunStateManager,
    cancel_rx: watch::Receiver<bool>,
}

impl DownloadRunner {
    /// Validate `settings` and prepare the download client.
    pub fn new(settings: RunSettings, registry: Arc<ProviderRegistry>) -> Result<Self, RunError> {
        settings.validate()?;

        let downloader = Downloader::new(DownloadOptions {
            out_dir: settings.out.clone(),
            concurrency: settings.concurrency,
            retries: settings.retries,
            timeout: settings.timeout_duration(),
        })?;
        // Sender dropped on purpose: without with_cancellation() the run is never cancelled.
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        Ok(Self {
            settings,
            registry,
            downloader,
            state: RunStateManager::new(),
            cancel_rx,
        })
    }

    pub fn with_cancellation(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.downloader = self.downloader.with_cancellation(cancel_rx.clone());
        self.cancel_rx = cancel_rx;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.downloader = self.downloader.with_retry_policy(policy);
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run to completion (or cancellation) and return every result.
    ///
    /// Duplicates come first, then downloads in completion order.
    pub async fn run(&self) -> Vec<DownloadResult> {
        self.state.reset();
        self.state.set_phase(RunPhase::Acquiring);
        tracing::info!(
            "Starting run: count={}, provider={}, theme={}, rating={}, randomize={}",
            self.settings.count,
            self.settings.provider,
            self.settings.theme,
            self.settings.rating,
            self.settings.randomize
        );

        let mut cancel_rx = self.cancel_rx.clone();
        let candidates = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => {
                tracing::warn!("Run cancelled while acquiring candidates");
                self.state.set_phase(RunPhase::Cancelled);
                return self.state.results();
            }
            candidates = self.acquire_candidates() => candidates,
        };

        let (mut unique, duplicates) = dedupe_candidates(candidates);
        unique.truncate(self.settings.count);
        self.state.record_results(duplicates);

        self.state.set_phase(RunPhase::Downloading { total: unique.len() });
        let state = self.state.clone();
        self.downloader
            .download_with(unique, |result| {
                state.record_result(result.clone());
            })
            .await;

        let phase = if *self.cancel_rx.borrow() {
            RunPhase::Cancelled
        } else {
            RunPhase::Finished
        };
        self.state.set_phase(phase);

        self.downloader.metrics().log_summary();
        let summary = self.summary();
        tracing::info!(
            "Run finished: {}/{} downloaded, {} failed, {} duplicates -> {}",
            summary.downloaded,
            summary.requested,
            summary.failed,
            summary.duplicates,
            summary.output_dir
        );

        self.state.results()
    }

    async fn acquire_candidates(&self) -> Vec<RemoteImage> {
        match self.settings.provider {
            ProviderChoice::Provider(id) => match self.registry.get(id) {
                Some(provider) => self.fetch_from(provider.as_ref(), self.settings.count).await,
                None => {
                    self.state.add_warning(format!("Provider {} is not available.", id));
                    Vec::new()
                }
            },
            ProviderChoice::Auto => self.acquire_auto().await,
        }
    }

    /// Walk the auto order, asking each provider for the remaining deficit.
    async fn acquire_auto(&self) -> Vec<RemoteImage> {
        let count = self.settings.count;
        let order = self.registry.auto_order(self.settings.rating, self.settings.theme);
        if order.is_empty() {
            self.state.add_warning(format!(
                "No provider supports theme '{}' with rating '{}'.",
                self.settings.theme, self.settings.rating
            ));
            return Vec::new();
        }

        let mut collected: Vec<RemoteImage> = Vec::with_capacity(count);
        for id in order {
            let remaining = count.saturating_sub(collected.len());
            if remaining == 0 {
                break;
            }
            let Some(provider) = self.registry.get(id) else {
                continue;
            };

            let fetched = self.fetch_from(provider.as_ref(), remaining).await;
            tracing::debug!("{} returned {} of {} candidates", id, fetched.len(), remaining);
            collected.extend(fetched);
        }

        collected.truncate(count);
        collected
    }

    /// Check capabilities, then fetch. A mismatch becomes a warning, not an error.
    async fn fetch_from(&self, provider: &dyn Provider, count: usize) -> Vec<RemoteImage> {
        let id = provider.id();
        let capabilities = provider.capabilities();
        let theme = self.settings.theme;
        let rating = self.settings.rating;

        if !capabilities.supports_theme(theme) {
            let supported: Vec<&str> = capabilities.themes.iter().map(|t| t.as_str()).collect();
            self.state.add_warning(format!(
                "{} does not support theme '{}'. Supported: {}.",
                id,
                theme,
                supported.join(", ")
            ));
            return Vec::new();
        }
        if !capabilities.supports_rating(rating) {
            let supported: Vec<&str> = capabilities.ratings.iter().map(|r| r.as_str()).collect();
            self.state.add_warning(format!(
                "{} does not support rating '{}'. Supported: {}.",
                id,
                rating,
                supported.join(", ")
            ));
            return Vec::new();
        }

        let request = FetchRequest {
            count,
            rating,
            timeout: self.settings.timeout_duration(),
            theme,
            randomize: self.settings.randomize,
        };
        provider.fetch_candidates(&request).await
    }

    /// Counts over the results recorded so far; safe to call mid-run.
    pub fn summary(&self) -> DownloadSummary {
        let output_dir = std::path::absolute(&self.settings.out)
            .ok()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .unwrap_or_else(|| self.settings.out.clone());
        self.state.summary(self.settings.count, output_dir)
    }

    /// 0 when every requested image was downloaded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.summary().is_complete() { 0 } else { 1 }
    }

    pub fn warnings(&self) -> Vec<String> {
        self.state.warnings()
    }

    pub fn results(&self) -> Vec<DownloadResult> {
        self.state.results()
    }

    /// Download metrics of the latest run; each run starts from zero.
    pub fn metrics(&self) -> Arc<DownloadMetrics> {
        self.downloader.metrics()
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.state.subscribe()
    }
}
