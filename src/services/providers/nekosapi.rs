use async_trait::async_trait;
use serde_json::Value;

use super::{FetchRequest, Provider, ProviderCapabilities, ProviderError, get_json, str_field};
use crate::models::{ProviderId, Rating, RemoteImage, Theme, UserRating};

pub const API_URL: &str = "https://api.nekosapi.com/v4/images/random";

const CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    themes: &[Theme::Catgirl],
    ratings: &UserRating::ALL,
    rating_filter: true,
};

fn theme_tag(theme: Theme) -> Option<&'static str> {
    match theme {
        Theme::Catgirl => Some("catgirl"),
        _ => None,
    }
}

/// Parse a nekosapi response.
///
/// Accepts `{"value": [...]}` as well as a bare array. Items without a usable url
/// are skipped; non-string tags are dropped.
pub fn parse_nekosapi_payload(
    payload: &Value,
    theme: Theme,
) -> Result<Vec<RemoteImage>, ProviderError> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("value") {
            None => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(ProviderError::Payload(
                    "nekosapi payload must include a list in 'value'".into(),
                ));
            }
        },
        _ => {
            return Err(ProviderError::Payload(
                "nekosapi returned an unexpected payload type".into(),
            ));
        }
    };

    let candidates = items
        .iter()
        .filter_map(|item| {
            let url = str_field(item, "url")?;
            let tags = item
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            Some(RemoteImage::new(
                ProviderId::NekosApi,
                theme,
                url,
                Rating::normalize(item.get("rating").and_then(Value::as_str)),
                tags,
            ))
        })
        .collect();

    Ok(candidates)
}

/// nekosapi.com: one request returns up to `count` images with rating filtering upstream.
pub struct NekosApiProvider {
    client: reqwest::Client,
    base_url: String,
}

impl NekosApiProvider {
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
impl Provider for NekosApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::NekosApi
    }

    fn capabilities(&self) -> ProviderCapabilities {
        CAPABILITIES
    }

    async fn fetch_candidates(&self, request: &FetchRequest) -> Vec<RemoteImage> {
        if request.count == 0 || !CAPABILITIES.supports(request.theme, request.rating) {
            return Vec::new();
        }
        let Some(tag) = theme_tag(request.theme) else {
            return Vec::new();
        };

        let mut params = vec![("tags", tag.to_string()), ("limit", request.count.to_string())];
        if request.rating != UserRating::Any {
            params.push(("rating", request.rating.to_string()));
        }

        let result = get_json(self.client.get(&self.base_url).query(&params), request.timeout)
            .await
            .and_then(|payload| parse_nekosapi_payload(&payload, request.theme));

        match result {
            Ok(mut candidates) => {
                candidates.truncate(request.count);
                candidates
            }
            Err(err) => {
                tracing::warn!("nekosapi request failed: {}", err);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value_list() {
        let payload = json!({
            "value": [
                {"url": "https://cdn.nekosapi.com/a.webp", "rating": "suggestive", "tags": ["catgirl", 7, "ears"]},
                {"url": "", "rating": "safe"},
                "not an object",
                {"url": "https://cdn.nekosapi.com/b.webp", "rating": "spicy"}
            ]
        });

        let candidates = parse_nekosapi_payload(&payload, Theme::Catgirl).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].rating(), Rating::Suggestive);
        assert_eq!(candidates[0].tags(), ["catgirl", "ears"]);
        assert_eq!(candidates[1].rating(), Rating::Unknown);
        assert!(candidates[1].tags().is_empty());
    }

    #[test]
    fn test_parse_bare_array_and_missing_value() {
        let payload = json!([{"url": "https://cdn.nekosapi.com/a.webp"}]);
        assert_eq!(parse_nekosapi_payload(&payload, Theme::Catgirl).unwrap().len(), 1);

        assert!(parse_nekosapi_payload(&json!({}), Theme::Catgirl).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_list_value() {
        assert!(parse_nekosapi_payload(&json!({"value": "nope"}), Theme::Catgirl).is_err());
        assert!(parse_nekosapi_payload(&json!("nope"), Theme::Catgirl).is_err());
    }
}
