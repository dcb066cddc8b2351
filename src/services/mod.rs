//! Services module - the download pipeline.
//!
//! Data flows leaves-first through these components:
//!
//! - [`providers`]: The [`Provider`] trait and its seven variants. Each turns
//!   `(count, rating, timeout, theme)` into [`RemoteImage`](crate::models::RemoteImage)
//!   candidates and never fails its caller.
//! - [`registry`]: [`ProviderRegistry`] holds the providers and computes the
//!   auto-fallback order for a theme/rating pair.
//! - [`dedup`]: [`dedupe_candidates`] drops repeated URLs and emits a duplicate
//!   result for each one.
//! - [`downloader`]: [`Downloader`] runs a bounded worker pool with per-candidate
//!   retry ([`retry`]) and atomic writes ([`fs`]).
//! - [`runner`]: [`DownloadRunner`] drives one run end to end and reports the
//!   summary, warnings and exit code.
//!
//! # Design Philosophy
//!
//! - **Async**: All network and file I/O runs on tokio
//! - **Testable**: Credentials, base URLs and the HTTP client are injected
//! - **Non-fatal**: Per-candidate failures become results, never errors
//!
//! # Usage Example
//!
//! ```ignore
//! use catgirl_downloader::models::{Credentials, RunSettings};
//! use catgirl_downloader::services::{DownloadRunner, ProviderRegistry, build_http_client};
//!
//! let registry = ProviderRegistry::with_defaults(build_http_client()?, &Credentials::from_env());
//! let runner = DownloadRunner::new(RunSettings::default(), Arc::new(registry))?;
//!
//! let results = runner.run().await;
//! println!("{:?}", runner.summary());
//! std::process::exit(runner.exit_code());
//! ```

pub mod dedup;
pub mod downloader;
pub mod fs;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod runner;

pub use dedup::dedupe_candidates;
pub use downloader::{DownloadError, DownloadOptions, Downloader, cancelled};
pub use fs::{build_filename, extension_from_content_type, url_hash};
pub use providers::{FetchRequest, Provider, ProviderCapabilities, ProviderError, build_http_client};
pub use registry::{ProviderInfo, ProviderRegistry, auto_priority};
pub use retry::{AttemptState, BACKOFF_SCHEDULE, RetryPolicy, Retryable};
pub use runner::{DownloadRunner, RunError};
