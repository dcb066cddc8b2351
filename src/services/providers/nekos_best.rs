use async_trait::async_trait;
use serde_json::Value;

use super::{FetchRequest, Provider, ProviderCapabilities, ProviderError, get_json, str_field};
use crate::models::{ProviderId, Rating, RemoteImage, Theme, UserRating};

pub const API_BASE: &str = "https://nekos.best/api/v2";

const CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    themes: &[Theme::Catgirl, Theme::Neko, Theme::Kitsune],
    ratings: &[UserRating::Any, UserRating::Safe],
    rating_filter: false,
};

fn endpoint(theme: Theme) -> Option<&'static str> {
    match theme {
        Theme::Catgirl | Theme::Neko => Some("neko"),
        Theme::Kitsune => Some("kitsune"),
        Theme::Femboy => None,
    }
}

/// Parse `{"results": [{"url": ...}, ...]}`. Everything nekos.best serves is safe.
pub fn parse_nekos_best_payload(
    payload: &Value,
    theme: Theme,
) -> Result<Vec<RemoteImage>, ProviderError> {
    let items = match payload.get("results") {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ProviderError::Payload(
                "nekos.best payload must include a list in 'results'".into(),
            ));
        }
    };

    Ok(items
        .iter()
        .filter_map(|item| str_field(item, "url"))
        .map(|url| {
            RemoteImage::new(
                ProviderId::NekosBest,
                theme,
                url,
                Rating::Safe,
                vec![theme.to_string(), "nekos.best".to_string()],
            )
        })
        .collect())
}

/// nekos.best: one batched request per fetch.
pub struct NekosBestProvider {
    client: reqwest::Client,
    base_url: String,
}

impl NekosBestProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for NekosBestProvider {
    fn id(&self) -> ProviderId {
        ProviderId::NekosBest
    }

    fn capabilities(&self) -> ProviderCapabilities {
        CAPABILITIES
    }

    async fn fetch_candidates(&self, request: &FetchRequest) -> Vec<RemoteImage> {
        if request.count == 0 || !CAPABILITIES.supports(request.theme, request.rating) {
            return Vec::new();
        }
        let Some(endpoint) = endpoint(request.theme) else {
            return Vec::new();
        };

        let url = format!("{}/{}", self.base_url, endpoint);
        let request_builder = self
            .client
            .get(&url)
            .query(&[("amount", request.count.to_string())]);

        match get_json(request_builder, request.timeout)
            .await
            .and_then(|payload| parse_nekos_best_payload(&payload, request.theme))
        {
            Ok(mut candidates) => {
                candidates.truncate(request.count);
                candidates
            }
            Err(err) => {
                tracing::warn!("nekos_best request failed for {}: {}", url, err);
                Vec::new()
            }
        }
    }
}
