use camino::Utf8PathBuf;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc, watch};

use crate::metrics::DownloadMetrics;
use crate::models::{DownloadResult, RemoteImage};
use crate::services::fs::{build_filename, category_dir, extension_from_content_type, write_atomic};
use crate::services::retry::{AttemptState, RetryPolicy, Retryable};

/// Errors from a single download attempt
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP error {status} for url '{url}'")]
    Status { status: StatusCode, url: String },

    #[error("Non-image content type: {0}")]
    NonImage(String),

    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return DownloadError::Timeout(err);
        }
        match (err.status(), err.url()) {
            (Some(status), Some(url)) => DownloadError::Status {
                status,
                url: url.to_string(),
            },
            _ => DownloadError::Transport(err),
        }
    }
}

impl Retryable for DownloadError {
    fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Timeout(_) => true,
            DownloadError::Transport(err) => !err.is_builder(),
            DownloadError::Status { status, .. } => status.as_u16() >= 500,
            DownloadError::NonImage(_) | DownloadError::Io(_) => false,
        }
    }
}

/// Settings the orchestrator needs from a run
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub out_dir: Utf8PathBuf,
    pub concurrency: usize,
    pub retries: u32,
    pub timeout: Duration,
}

/// Resolve once `cancel_rx` reads `true`. Never resolves if the sender is gone.
pub async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    let closed = cancel_rx.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Bounded-concurrency download orchestrator.
///
/// Every candidate gets its own task. A task holds one semaphore permit for its
/// whole retry sequence and sends exactly one [`DownloadResult`] to a single
/// collector over an mpsc channel, unless the run is cancelled first.
///
/// Each call to [`download_with`](Self::download_with) records into fresh metrics.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    out_dir: Utf8PathBuf,
    concurrency: usize,
    timeout: Duration,
    policy: RetryPolicy,
    last_metrics: Arc<Mutex<Arc<DownloadMetrics>>>,
    cancel_rx: watch::Receiver<bool>,
}

impl Downloader {
    /// Create a downloader with its own HTTP client (redirects followed).
    pub fn new(options: DownloadOptions) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, options))
    }

    /// Create a downloader around an existing client.
    ///
    /// `options.timeout` is applied to every request, whatever the client's own settings.
    pub fn with_client(client: reqwest::Client, options: DownloadOptions) -> Self {
        // Sender dropped on purpose: without with_cancellation() the run is never cancelled.
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        Self {
            client,
            out_dir: options.out_dir,
            concurrency: options.concurrency.max(1),
            timeout: options.timeout,
            policy: RetryPolicy::new(options.retries),
            last_metrics: Arc::new(Mutex::new(Arc::new(DownloadMetrics::new()))),
            cancel_rx,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancellation(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = cancel_rx;
        self
    }

    /// Metrics of the most recent download call.
    pub fn metrics(&self) -> Arc<DownloadMetrics> {
        let guard = self.last_metrics.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Download every candidate; results arrive in completion order.
    pub async fn download(&self, candidates: Vec<RemoteImage>) -> Vec<DownloadResult> {
        self.download_with(candidates, |_| {}).await
    }

    /// Like [`download`](Self::download), calling `on_result` as each result is collected.
    pub async fn download_with<F>(
        &self,
        candidates: Vec<RemoteImage>,
        mut on_result: F,
    ) -> Vec<DownloadResult>
    where
        F: FnMut(&DownloadResult),
    {
        let metrics = Arc::new(DownloadMetrics::new());
        *self.last_metrics.lock().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&metrics);

        if candidates.is_empty() {
            return Vec::new();
        }

        let total = candidates.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();

        tracing::info!(
            "Downloading {} candidates (max concurrent: {}, retries: {})",
            total,
            self.concurrency,
            self.policy.retries()
        );

        for image in candidates {
            let worker = self.clone();
            let metrics = Arc::clone(&metrics);
            let semaphore = Arc::clone(&semaphore);
            let result_tx = result_tx.clone();
            let mut cancel_rx = self.cancel_rx.clone();

            tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel_rx) => {
                        tracing::warn!("Download cancelled before starting: {}", image.url());
                        return;
                    }
                    permit = semaphore.acquire() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                let result = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel_rx) => {
                        tracing::warn!("Download abandoned: {}", image.url());
                        return;
                    }
                    result = worker.download_one(&image, &metrics) => result,
                };

                // The collector only goes away once every sender is dropped.
                let _ = result_tx.send(result);
            });
        }
        drop(result_tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            on_result(&result);
            results.push(result);
        }

        tracing::info!("Collected {} of {} download results", results.len(), total);
        results
    }

    /// Run the attempt state machine for one candidate.
    async fn download_one(
        &self,
        image: &RemoteImage,
        metrics: &DownloadMetrics,
    ) -> DownloadResult {
        let mut state = AttemptState::Attempting(0);

        loop {
            state = match state {
                AttemptState::Attempting(attempt) => {
                    metrics.record_attempt();
                    let outcome = self.attempt(image, metrics).await;
                    if let Err(ref err) = outcome {
                        tracing::debug!(
                            "Attempt {} of {} failed for {}: {}",
                            attempt + 1,
                            self.policy.max_attempts(),
                            image.url(),
                            err
                        );
                    }
                    self.policy.transition(attempt, outcome)
                }
                AttemptState::Retrying { attempt, delay } => {
                    metrics.record_retry();
                    tokio::time::sleep(delay).await;
                    AttemptState::Attempting(attempt + 1)
                }
                AttemptState::Succeeded(path) => {
                    tracing::info!("Downloaded {} -> {}", image.url(), path);
                    return DownloadResult::ok(image, path);
                }
                AttemptState::Failed(error) => {
                    metrics.record_failure();
                    tracing::warn!("Download failed for {}: {}", image.url(), error);
                    return DownloadResult::failed(image, error);
                }
            };
        }
    }

    /// One GET, validated and written atomically under `<out_dir>/<theme>/`.
    async fn attempt(
        &self,
        image: &RemoteImage,
        metrics: &DownloadMetrics,
    ) -> Result<Utf8PathBuf, DownloadError> {
        let response = self
            .client
            .get(image.url())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                status,
                url: image.url().to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        match content_type.as_deref() {
            Some(value) if value.to_ascii_lowercase().starts_with("image/") => {}
            other => {
                return Err(DownloadError::NonImage(
                    other.unwrap_or("missing").to_string(),
                ));
            }
        }

        let body = response.bytes().await?;

        let extension = extension_from_content_type(content_type.as_deref(), image.url());
        let dir = category_dir(&self.out_dir, image.category());
        tokio::fs::create_dir_all(&dir).await?;

        // Named at write time, so a retried candidate may get a new timestamp.
        let destination = dir.join(build_filename(
            image.provider().as_str(),
            image.url(),
            &extension,
            Utc::now(),
        ));
        let size = body.len();
        write_atomic(destination.clone(), body).await?;

        metrics.record_success(size);
        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_errors_classified_by_code() {
        let server_error = DownloadError::Status {
            status: StatusCode::BAD_GATEWAY,
            url: "https://img.example/a.png".to_string(),
        };
        let client_error = DownloadError::Status {
            status: StatusCode::NOT_FOUND,
            url: "https://img.example/a.png".to_string(),
        };

        assert!(server_error.is_retryable());
        assert!(!client_error.is_retryable());
        assert!(client_error.to_string().contains("404"));
    }

    #[test]
    fn test_content_and_io_errors_are_permanent() {
        let non_image = DownloadError::NonImage("text/html".to_string());
        assert!(!non_image.is_retryable());
        assert_eq!(non_image.to_string(), "Non-image content type: text/html");

        let io = DownloadError::from(std::io::Error::other("disk full"));
        assert!(!io.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_candidates_return_immediately() {
        let downloader = Downloader::new(DownloadOptions {
            out_dir: Utf8PathBuf::from("/nonexistent/never-created"),
            concurrency: 2,
            retries: 1,
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        let results = downloader.download(Vec::new()).await;

        assert!(results.is_empty());
        assert!(!std::path::Path::new("/nonexistent/never-created").exists());
    }

    #[tokio::test]
    async fn test_cancelled_helper_resolves_on_true() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .expect("cancellation should resolve");
    }

    #[tokio::test]
    async fn test_cancelled_helper_pends_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);

        let outcome = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(outcome.is_err());
    }
}
