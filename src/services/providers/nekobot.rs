use async_trait::async_trait;
use serde_json::Value;

use super::{FetchRequest, Provider, ProviderCapabilities, ProviderError, get_json, str_field};
use crate::models::{ProviderId, Rating, RemoteImage, Theme, UserRating};

pub const API_URL: &str = "https://nekobot.xyz/api/image";

const CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    themes: &[Theme::Catgirl, Theme::Neko],
    ratings: &[UserRating::Any, UserRating::Safe],
    rating_filter: false,
};

/// Parse `{"success": true, "message": "<url>"}`.
pub fn parse_nekobot_payload(payload: &Value) -> Result<String, ProviderError> {
    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ProviderError::Payload("nekobot reported an unsuccessful response".into()));
    }
    str_field(payload, "message")
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::Payload("nekobot payload missing non-empty 'message' url".into())
        })
}

/// nekobot.xyz: one request per image.
pub struct NekobotProvider {
    client: reqwest::Client,
    base_url: String,
}

impl NekobotProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Provider for NekobotProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Nekobot
    }

    fn capabilities(&self) -> ProviderCapabilities {
        CAPABILITIES
    }

    async fn fetch_candidates(&self, request: &FetchRequest) -> Vec<RemoteImage> {
        if request.count == 0 || !CAPABILITIES.supports(request.theme, request.rating) {
            return Vec::new();
        }

        let mut candidates = Vec::with_capacity(request.count);
        for _ in 0..request.count {
            let request_builder = self.client.get(&self.base_url).query(&[("type", "neko")]);
            match get_json(request_builder, request.timeout)
                .await
                .and_then(|payload| parse_nekobot_payload(&payload))
            {
                Ok(url) => candidates.push(RemoteImage::new(
                    ProviderId::Nekobot,
                    request.theme,
                    url,
                    Rating::Safe,
                    vec![request.theme.to_string(), "nekobot".to_string()],
                )),
                Err(err) => tracing::warn!("nekobot request failed for {}: {}", self.base_url, err),
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success_payload() {
        let payload = json!({"success": true, "message": "https://i0.nekobot.xyz/a.png", "color": 1});
        assert_eq!(parse_nekobot_payload(&payload).unwrap(), "https://i0.nekobot.xyz/a.png");
    }

    #[test]
    fn test_unsuccessful_payload_is_an_error() {
        let payload = json!({"success": false, "message": "https://i0.nekobot.xyz/a.png"});
        assert!(parse_nekobot_payload(&payload).is_err());
        assert!(parse_nekobot_payload(&json!({"success": true})).is_err());
    }
}
