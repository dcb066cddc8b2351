use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;

use super::{
    FetchRequest, Provider, ProviderCapabilities, finalize, get_json, randomized_limit, str_field,
};
use crate::models::{ApiCredentials, ProviderId, Rating, RemoteImage, Theme, UserRating};

pub const API_URL: &str = "https://api.rule34.xxx/index.php";
pub const MAX_LIMIT: usize = 100;
pub const RANDOM_PID_MAX: u32 = 200;

const CAPABILITIES: ProviderCapabilities = ProviderCapabilities {
    themes: &[Theme::Femboy],
    ratings: &UserRating::ALL,
    rating_filter: true,
};

fn theme_tag(theme: Theme) -> Option<&'static str> {
    match theme {
        Theme::Femboy => Some("femboy"),
        _ => None,
    }
}

fn rating_tag(rating: UserRating) -> Option<&'static str> {
    match rating {
        UserRating::Any => None,
        UserRating::Safe => Some("rating:safe"),
        UserRating::Suggestive | UserRating::Borderline => Some("rating:questionable"),
        UserRating::Explicit => Some("rating:explicit"),
    }
}

fn map_rating(raw: Option<&str>) -> Rating {
    match raw {
        Some("s" | "safe") => Rating::Safe,
        Some("q" | "questionable") => Rating::Suggestive,
        Some("e" | "explicit") => Rating::Explicit,
        _ => Rating::Unknown,
    }
}

/// Parse a rule34 dapi response.
///
/// The API answers with a bare array of posts, or an object whose `post` field is
/// a list or a single post. Anything else yields no candidates.
pub fn parse_rule34_payload(payload: &Value, theme: Theme) -> Vec<RemoteImage> {
    let posts: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("post") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(post @ Value::Object(_)) => vec![post],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    posts
        .into_iter()
        .filter(|post| post.is_object())
        .filter_map(|post| {
            let raw_url = ["file_url", "sample_url", "preview_url"]
                .iter()
                .find_map(|key| str_field(post, key))?;
            let url = match raw_url.strip_prefix("//") {
                Some(rest) => format!("https://{}", rest),
                None => raw_url.to_string(),
            };

            let mut tags = vec![theme.to_string(), "rule34".to_string()];
            if let Some(tag_field) = post.get("tags").and_then(Value::as_str) {
                tags.extend(tag_field.split_whitespace().map(str::to_string));
            }

            Some(RemoteImage::new(
                ProviderId::Rule34,
                theme,
                url,
                map_rating(post.get("rating").and_then(Value::as_str)),
                tags,
            ))
        })
        .collect()
}

/// rule34.xxx dapi search. Needs a user id and API key.
pub struct Rule34Provider {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
}

impl Rule34Provider {
    pub fn new(client: reqwest::Client, credentials: Option<ApiCredentials>) -> Self {
        Self {
            client,
            base_url: API_URL.to_string(),
            credentials,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request_posts(
        &self,
        params: &[(&str, String)],
        request: &FetchRequest,
    ) -> Option<Vec<RemoteImage>> {
        match get_json(self.client.get(&self.base_url).query(params), request.timeout).await {
            Ok(payload) => Some(parse_rule34_payload(&payload, request.theme)),
            Err(err) => {
                tracing::warn!("rule34 request failed: {}", err);
                None
            }
        }
    }
}

#[async_trait]
impl Provider for Rule34Provider {
    fn id(&self) -> ProviderId {
        ProviderId::Rule34
    }

    fn capabilities(&self) -> ProviderCapabilities {
        CAPABILITIES
    }

    async fn fetch_candidates(&self, request: &FetchRequest) -> Vec<RemoteImage> {
        if request.count == 0 || !CAPABILITIES.supports(request.theme, request.rating) {
            return Vec::new();
        }
        let Some(theme_tag) = theme_tag(request.theme) else {
            return Vec::new();
        };
        let Some(credentials) = self.credentials.as_ref() else {
            tracing::warn!("rule34 requires RULE34_USER_ID and RULE34_API_KEY in environment");
            return Vec::new();
        };

        let tags: Vec<&str> = std::iter::once(theme_tag)
            .chain(rating_tag(request.rating))
            .collect();
        let limit = if request.randomize {
            randomized_limit(request.count, MAX_LIMIT)
        } else {
            request.count
        };

        let mut params = vec![
            ("page", "dapi".to_string()),
            ("s", "post".to_string()),
            ("q", "index".to_string()),
            ("json", "1".to_string()),
            ("limit", limit.to_string()),
            ("tags", tags.join(" ")),
            ("user_id", credentials.user.clone()),
            ("api_key", credentials.api_key.clone()),
        ];
        if request.randomize {
            let pid = rand::rng().random_range(0..=RANDOM_PID_MAX);
            params.push(("pid", pid.to_string()));
        }

        let Some(mut candidates) = self.request_posts(&params, request).await else {
            return Vec::new();
        };

        if request.randomize && candidates.is_empty() {
            tracing::debug!("rule34 random pid was empty, retrying without a pid");
            params.retain(|(key, _)| *key != "pid");
            candidates = self.request_posts(&params, request).await.unwrap_or_default();
        }

        finalize(candidates, request.count, request.randomize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_array() {
        let payload = json!([
            {"file_url": "//img.rule34.xxx/images/1/a.jpg", "rating": "questionable", "tags": "femboy  solo"},
            {"sample_url": "https://img.rule34.xxx/samples/b.jpg", "rating": "s"},
            {"rating": "e"}
        ]);

        let candidates = parse_rule34_payload(&payload, Theme::Femboy);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].url(), "https://img.rule34.xxx/images/1/a.jpg");
        assert_eq!(candidates[0].rating(), Rating::Suggestive);
        assert_eq!(candidates[0].tags(), ["femboy", "rule34", "femboy", "solo"]);
        assert_eq!(candidates[1].url(), "https://img.rule34.xxx/samples/b.jpg");
        assert_eq!(candidates[1].rating(), Rating::Safe);
    }

    #[test]
    fn test_parse_post_wrapper_shapes() {
        let single = json!({"post": {"file_url": "https://img.rule34.xxx/a.png", "rating": "explicit"}});
        let listed = json!({"post": [{"preview_url": "https://img.rule34.xxx/p.png"}]});

        assert_eq!(parse_rule34_payload(&single, Theme::Femboy)[0].rating(), Rating::Explicit);
        assert_eq!(parse_rule34_payload(&listed, Theme::Femboy).len(), 1);
        assert!(parse_rule34_payload(&json!({"post": "x"}), Theme::Femboy).is_empty());
        assert!(parse_rule34_payload(&json!("oops"), Theme::Femboy).is_empty());
    }

    #[test]
    fn test_empty_file_url_falls_through_to_sample() {
        let payload = json!([{"file_url": "", "sample_url": "https://img.rule34.xxx/s.png"}]);
        assert_eq!(
            parse_rule34_payload(&payload, Theme::Femboy)[0].url(),
            "https://img.rule34.xxx/s.png"
        );
    }

    #[test]
    fn test_rating_tags() {
        assert_eq!(rating_tag(UserRating::Suggestive), Some("rating:questionable"));
        assert_eq!(rating_tag(UserRating::Safe), Some("rating:safe"));
        assert_eq!(rating_tag(UserRating::Any), None);
    }
}
