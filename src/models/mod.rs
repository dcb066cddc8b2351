//! Data models for the downloader.
//!
//! This module contains the core data structures shared by every stage of a run:
//! - [`RemoteImage`]: A candidate image discovered by a provider, not yet downloaded
//! - [`DownloadResult`]: Exactly one record per candidate that entered the pipeline
//! - [`DownloadSummary`]: Counts derived from a run's results, recomputed on demand
//! - [`RunSettings`]: The immutable settings of one run
//! - [`Credentials`]: Provider accounts, injected into provider construction
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: Settings derive `Serialize`/`Deserialize` for YAML and environment loading
//! - **Immutable**: Candidates and results expose getters only; constructors enforce invariants

pub mod image;
pub mod settings;

pub use image::{
    DUPLICATE_URL_MESSAGE, DownloadResult, DownloadStatus, DownloadSummary, MAX_TAGS, ProviderId,
    Rating, RemoteImage, RunStatus, Theme, UserRating,
};
pub use settings::{
    ApiCredentials, Credentials, DEFAULT_E621_USER_AGENT, ProviderChoice, RunSettings,
    SettingsError,
};
