use async_trait::async_trait;
use rand::Rng;
use reqwest::header::USER_AGENT;
use serde_json::Value;

use super::{
    FetchRequest, Provider, ProviderCapabilities, ProviderError, finalize, get_json,
    randomized_limit, str_field,
};
use crate::models::{ApiCredentials, MAX_TAGS, ProviderId, Rating, RemoteImage, Theme, UserRating};

pub const API_URL: &str = "https://e621.net/posts.json";
pub const MAX_LIMIT: usize = 320;
pub const RANDOM_PAGE_MAX: u32 = 100;

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
        UserRating::Safe => Some("rating:s"),
        UserRating::Suggestive | UserRating::Borderline => Some("rating:q"),
        UserRating::Explicit => Some("rating:e"),
    }
}

fn map_rating(raw: Option<&str>) -> Rating {
    match raw {
        Some("s") => Rating::Safe,
        Some("q") => Rating::Suggestive,
        Some("e") => Rating::Explicit,
        _ => Rating::Unknown,
    }
}

/// Parse `{"posts": [{"file": {"url"}, "rating", "tags": {group: [..]}}]}`.
///
/// Posts without a file url (deleted or login-gated) are skipped.
pub fn parse_e621_payload(
    payload: &Value,
    theme: Theme,
) -> Result<Vec<RemoteImage>, ProviderError> {
    let posts = match payload.get("posts") {
        None => return Ok(Vec::new()),
        Some(Value::Array(posts)) => posts,
        Some(_) => {
            return Err(ProviderError::Payload(
                "e621 payload must include a list in 'posts'".into(),
            ));
        }
    };

    let candidates = posts
        .iter()
        .filter_map(|post| {
            let url = post.get("file").and_then(|file| str_field(file, "url"))?;

            let mut tags = vec![theme.to_string(), "e621".to_string()];
            if let Some(groups) = post.get("tags").and_then(Value::as_object) {
                for values in groups.values().filter_map(Value::as_array) {
                    tags.extend(values.iter().filter_map(Value::as_str).map(str::to_string));
                    if tags.len() > MAX_TAGS {
                        break;
                    }
                }
            }

            Some(RemoteImage::new(
                ProviderId::E621,
                theme,
                url,
                map_rating(post.get("rating").and_then(Value::as_str)),
                tags,
            ))
        })
        .collect();

    Ok(candidates)
}

/// e621.net posts search. Needs a login and API key; sends a descriptive User-Agent.
pub struct E621Provider {
    client: reqwest::Client,
    base_url: String,
    credentials: Option<ApiCredentials>,
    user_agent: String,
}

impl E621Provider {
    pub fn new(
        client: reqwest::Client,
        credentials: Option<ApiCredentials>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: API_URL.to_string(),
            credentials,
            user_agent: user_agent.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request_posts(
        &self,
        credentials: &ApiCredentials,
        params: &[(&str, String)],
        request: &FetchRequest,
    ) -> Option<Vec<RemoteImage>> {
        let builder = self
            .client
            .get(&self.base_url)
            .query(params)
            .header(USER_AGENT, &self.user_agent)
            .basic_auth(&credentials.user, Some(&credentials.api_key));

        match get_json(builder, request.timeout)
            .await
            .and_then(|payload| parse_e621_payload(&payload, request.theme))
        {
            Ok(candidates) => Some(candidates),
            Err(err) => {
                tracing::warn!("e621 request failed: {}", err);
                None
            }
        }
    }
}

#[async_trait]
impl Provider for E621Provider {
    fn id(&self) -> ProviderId {
        ProviderId::E621
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
            tracing::warn!("e621 requires E621_LOGIN and E621_API_KEY in environment");
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

        let mut params = vec![("tags", tags.join(" ")), ("limit", limit.to_string())];
        if request.randomize {
            let page = rand::rng().random_range(1..=RANDOM_PAGE_MAX);
            params.push(("page", page.to_string()));
        }

        let Some(mut candidates) = self.request_posts(credentials, &params, request).await else {
            return Vec::new();
        };

        if request.randomize && candidates.is_empty() {
            tracing::debug!("e621 random page was empty, retrying without a page");
            params.retain(|(key, _)| *key != "page");
            candidates = self
                .request_posts(credentials, &params, request)
                .await
                .unwrap_or_default();
        }

        finalize(candidates, request.count, request.randomize)
    }
}
