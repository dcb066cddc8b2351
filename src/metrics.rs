// Download metrics module
//
// Provides lightweight counters for one download run

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Per-run download metrics
///
/// Uses atomic operations so every download task can record into the same
/// instance without locks. The runner logs a summary when the run ends.
#[derive(Debug)]
pub struct DownloadMetrics {
    /// HTTP attempts issued, including retries
    pub attempts: AtomicU64,

    /// Attempts that were followed by a backoff and another try
    pub retries: AtomicU64,

    /// Candidates written to disk
    pub downloads_ok: AtomicUsize,

    /// Candidates that ended as failed
    pub downloads_failed: AtomicUsize,

    /// Bytes persisted across all successful downloads
    pub bytes_written: AtomicU64,

    start_time: Instant,
}

impl DownloadMetrics {
    pub fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            downloads_ok: AtomicUsize::new(0),
            downloads_failed: AtomicUsize::new(0),
            bytes_written: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, bytes: usize) {
        self.downloads_ok.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.downloads_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average attempts per finished candidate
    pub fn avg_attempts(&self) -> f64 {
        let finished = self.downloads_ok.load(Ordering::Relaxed)
            + self.downloads_failed.load(Ordering::Relaxed);
        if finished > 0 {
            self.attempts.load(Ordering::Relaxed) as f64 / finished as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!(
            "Downloads: {} ok, {} failed in {:.2}s",
            self.downloads_ok.load(Ordering::Relaxed),
            self.downloads_failed.load(Ordering::Relaxed),
            self.elapsed().as_secs_f64()
        );
        tracing::info!(
            "Attempts: {} (retries: {}, avg {:.2} per candidate), bytes written: {}",
            self.attempts.load(Ordering::Relaxed),
            self.retries.load(Ordering::Relaxed),
            self.avg_attempts(),
            self.bytes_written.load(Ordering::Relaxed)
        );
    }
}

impl Default for DownloadMetrics {
    fn default() -> Self {
        Self::new()
    }
}
