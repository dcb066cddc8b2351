use async_trait::async_trait;
use serde_json::Value;

use super::{FetchRequest, Provider, ProviderCapabilities, ProviderError, get_json, str_field};
use crate::models::{ProviderId, Rating, RemoteImage, Theme, UserRating};

pub const API_BASE: &str = "https://api.waifu.pics";

const CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    themes: &[Theme::Catgirl, Theme::Neko, Theme::Femboy],
    ratings: &[UserRating::Any, UserRating::Safe, UserRating::Explicit],
    rating_filter: true,
};

fn endpoint_theme(theme: Theme) -> Option<&'static str> {
    match theme {
        Theme::Catgirl | Theme::Neko => Some("neko"),
        Theme::Femboy => Some("trap"),
        Theme::Kitsune => None,
    }
}

/// Pick the sfw/nsfw endpoint for one call. `None` when the combination has no endpoint.
fn resolve_mode(theme: Theme, rating: UserRating) -> Option<(&'static str, Rating)> {
    if theme == Theme::Femboy {
        return match rating {
            UserRating::Safe => None,
            _ => Some(("nsfw", Rating::Explicit)),
        };
    }

    match rating {
        UserRating::Explicit => Some(("nsfw", Rating::Explicit)),
        UserRating::Any if rand::random::<bool>() => Some(("nsfw", Rating::Explicit)),
        _ => Some(("sfw", Rating::Safe)),
    }
}

/// Extract the single image url from a waifu.pics response.
pub fn parse_waifu_pics_payload(payload: &Value) -> Result<String, ProviderError> {
    str_field(payload, "url")
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::Payload("waifu.pics payload missing non-empty 'url' field".into())
        })
}

/// waifu.pics: one request per image.
pub struct WaifuPicsProvider {
    client: reqwest::Client,
    base_url: String,
}

impl WaifuPicsProvider {
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
impl Provider for WaifuPicsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WaifuPics
    }

    fn capabilities(&self) -> ProviderCapabilities {
        CAPABILITIES
    }

    async fn fetch_candidates(&self, request: &FetchRequest) -> Vec<RemoteImage> {
        if request.count == 0 || !CAPABILITIES.supports(request.theme, request.rating) {
            return Vec::new();
        }
        let Some(endpoint_theme) = endpoint_theme(request.theme) else {
            return Vec::new();
        };

        let mut candidates = Vec::with_capacity(request.count);
        for _ in 0..request.count {
            let Some((mode, rating)) = resolve_mode(request.theme, request.rating) else {
                break;
            };
            let endpoint = format!("{}/{}/{}", self.base_url, mode, endpoint_theme);

            let url = match get_json(self.client.get(&endpoint), request.timeout)
                .await
                .and_then(|payload| parse_waifu_pics_payload(&payload))
            {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!("waifu_pics request failed for {}: {}", endpoint, err);
                    continue;
                }
            };

            candidates.push(RemoteImage::new(
                ProviderId::WaifuPics,
                request.theme,
                url,
                rating,
                vec![
                    endpoint_theme.to_string(),
                    request.theme.to_string(),
                    "waifu.pics".to_string(),
                ],
            ));
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payload() {
        assert_eq!(
            parse_waifu_pics_payload(&json!({"url": "https://i.waifu.pics/a.png"})).unwrap(),
            "https://i.waifu.pics/a.png"
        );
        assert!(parse_waifu_pics_payload(&json!({"url": ""})).is_err());
        assert!(parse_waifu_pics_payload(&json!({"message": "nope"})).is_err());
    }

    #[test]
    fn test_femboy_is_nsfw_only() {
        assert_eq!(resolve_mode(Theme::Femboy, UserRating::Safe), None);
        assert_eq!(
            resolve_mode(Theme::Femboy, UserRating::Any),
            Some(("nsfw", Rating::Explicit))
        );
    }

    #[test]
    fn test_mode_matches_rating() {
        assert_eq!(resolve_mode(Theme::Neko, UserRating::Safe), Some(("sfw", Rating::Safe)));
        assert_eq!(
            resolve_mode(Theme::Catgirl, UserRating::Explicit),
            Some(("nsfw", Rating::Explicit))
        );

        for _ in 0..16 {
            let (mode, rating) = resolve_mode(Theme::Catgirl, UserRating::Any).unwrap();
            let expected = if mode == "sfw" { Rating::Safe } else { Rating::Explicit };
            assert_eq!(rating, expected);
        }
    }

    #[tokio::test]
    async fn test_unsupported_rating_makes_no_requests() {
        let provider = WaifuPicsProvider::new(reqwest::Client::new())
            .with_base_url("http://127.0.0.1:9");
        let request = FetchRequest {
            count: 2,
            rating: UserRating::Suggestive,
            timeout: std::time::Duration::from_millis(50),
            theme: Theme::Catgirl,
            randomize: false,
        };

        assert!(provider.fetch_candidates(&request).await.is_empty());
    }
}
