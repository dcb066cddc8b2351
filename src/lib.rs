// catgirl-downloader - concurrent, deduplicating image downloader
//
// This is the library crate containing the download pipeline and data structures.
// The binary crate (main.rs) loads settings, runs once and reports the summary.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{
    Credentials, DownloadResult, DownloadStatus, DownloadSummary, ProviderChoice, ProviderId,
    RemoteImage, RunSettings, Theme, UserRating,
};
pub use services::{DownloadRunner, ProviderRegistry, RunError};
pub use state::{RunEvent, RunPhase, RunStateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
