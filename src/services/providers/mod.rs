//! Image providers.
//!
//! Each provider turns a [`FetchRequest`] into a list of [`RemoteImage`] candidates.
//! Providers never fail the caller: unsupported theme/rating combinations, missing
//! credentials and wire-level errors all end in fewer (possibly zero) candidates,
//! with the reason logged through `tracing`.
//!
//! Capability and endpoint tables are static data on each provider:
//!
//! | provider | themes | ratings |
//! |----------|--------|---------|
//! | [`WaifuPicsProvider`] | catgirl, neko, femboy | any, safe, explicit |
//! | [`NekosApiProvider`] | catgirl | all |
//! | [`NekosBestProvider`] | catgirl, neko, kitsune | any, safe |
//! | [`NekosLifeProvider`] | catgirl, neko, kitsune | any, safe |
//! | [`NekobotProvider`] | catgirl, neko | any, safe |
//! | [`E621Provider`] | femboy | all (needs credentials) |
//! | [`Rule34Provider`] | femboy | all (needs credentials) |

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::{ProviderId, RemoteImage, Theme, UserRating};

pub mod e621;
pub mod nekobot;
pub mod nekos_best;
pub mod nekos_life;
pub mod nekosapi;
pub mod rule34;
pub mod waifu_pics;

pub use e621::E621Provider;
pub use nekobot::NekobotProvider;
pub use nekos_best::NekosBestProvider;
pub use nekos_life::NekosLifeProvider;
pub use nekosapi::NekosApiProvider;
pub use rule34::Rule34Provider;
pub use waifu_pics::WaifuPicsProvider;

/// Multiplier applied to `count` when a provider widens its pool for randomized queries.
pub const RANDOM_POOL_MULTIPLIER: usize = 8;

/// What the caller wants from one provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    pub count: usize,
    pub rating: UserRating,
    pub timeout: Duration,
    pub theme: Theme,
    pub randomize: bool,
}

/// Static theme/rating support of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCapabilities {
    pub themes: &'static [Theme],
    pub ratings: &'static [UserRating],
    /// Whether the upstream API filters by rating itself
    pub rating_filter: bool,
}

impl ProviderCapabilities {
    pub fn supports_theme(&self, theme: Theme) -> bool {
        self.themes.contains(&theme)
    }

    pub fn supports_rating(&self, rating: UserRating) -> bool {
        self.ratings.contains(&rating)
    }

    pub fn supports(&self, theme: Theme, rating: UserRating) -> bool {
        self.supports_theme(theme) && self.supports_rating(rating)
    }
}

/// Failures inside a provider. Logged and swallowed, never returned to the runner.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed payload: {0}")]
    Payload(String),
}

/// A source of candidate images.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Return at most `request.count` candidates.
    ///
    /// Returns an empty list for unsupported theme/rating combinations and when
    /// every upstream call fails.
    async fn fetch_candidates(&self, request: &FetchRequest) -> Vec<RemoteImage>;
}

/// Build the HTTP client shared by all providers.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(crate::models::DEFAULT_E621_USER_AGENT)
        .build()
}

/// Send `request` with `timeout`, require a 2xx status and decode the JSON body.
pub(crate) async fn get_json(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Value, ProviderError> {
    let response = request.timeout(timeout).send().await?.error_for_status()?;
    Ok(response.json::<Value>().await?)
}

/// Non-empty string field `key` of a JSON object.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Page size for a randomized request.
///
/// `count` widened by [`RANDOM_POOL_MULTIPLIER`], capped at `max`.
pub(crate) fn randomized_limit(count: usize, max: usize) -> usize {
    count.saturating_mul(RANDOM_POOL_MULTIPLIER).max(count).min(max)
}

/// Shuffle when randomized, then keep at most `count`.
pub(crate) fn finalize(
    mut candidates: Vec<RemoteImage>,
    count: usize,
    randomize: bool,
) -> Vec<RemoteImage> {
    if randomize && candidates.len() > 1 {
        candidates.shuffle(&mut rand::rng());
    }
    candidates.truncate(count);
    candidates
}
