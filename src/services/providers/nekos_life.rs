use async_trait::async_trait;
use serde_json::Value;

use super::{FetchRequest, Provider, ProviderCapabilities, ProviderError, get_json, str_field};
use crate::models::{ProviderId, Rating, RemoteImage, Theme, UserRating};

pub const API_BASE: &str = "https://nekos.life/api/v2/img";

const CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    themes: &[Theme::Catgirl, Theme::Neko, Theme::Kitsune],
    ratings: &[UserRating::Any, UserRating::Safe],
    rating_filter: false,
};

fn endpoint(theme: Theme) -> Option<&'static str> {
    match theme {
        Theme::Catgirl | Theme::Neko => Some("neko"),
        Theme::Kitsune => Some("fox_girl"),
        Theme::Femboy => None,
    }
}

pub fn parse_nekos_life_payload(payload: &Value) -> Result<String, ProviderError> {
    str_field(payload, "url")
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::Payload("nekos.life payload missing non-empty 'url' field".into())
        })
}

/// nekos.life: one request per image.
pub struct NekosLifeProvider {
    client: reqwest::Client,
    base_url: String,
}

impl NekosLifeProvider {
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
impl Provider for NekosLifeProvider {
    fn id(&self) -> ProviderId {
        ProviderId::NekosLife
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

        let mut candidates = Vec::with_capacity(request.count);
        for _ in 0..request.count {
            match get_json(self.client.get(&url), request.timeout)
                .await
                .and_then(|payload| parse_nekos_life_payload(&payload))
            {
                Ok(image_url) => candidates.push(RemoteImage::new(
                    ProviderId::NekosLife,
                    request.theme,
                    image_url,
                    Rating::Safe,
                    vec![request.theme.to_string(), "nekos.life".to_string()],
                )),
                Err(err) => tracing::warn!("nekos_life request failed for {}: {}", url, err),
            }
        }
        candidates
    }
}
