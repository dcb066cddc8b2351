//! Integration tests for the concrete providers against mocked upstream APIs
//!
//! These tests verify that each provider:
//! - Sends the expected query parameters and headers
//! - Maps payloads into candidates with the right rating and tags
//! - Swallows upstream failures and returns fewer (or zero) candidates
//! - Honors the randomized page fallback and credential requirements

use catgirl_downloader::models::{ApiCredentials, ProviderId, Rating, Theme, UserRating};
use catgirl_downloader::services::FetchRequest;
use catgirl_downloader::services::providers::{
    E621Provider, NekobotProvider, NekosApiProvider, NekosBestProvider, NekosLifeProvider, Provider,
    Rule34Provider, WaifuPicsProvider,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

fn request(count: usize, rating: UserRating, theme: Theme) -> FetchRequest {
    FetchRequest {
        count,
        rating,
        timeout: Duration::from_secs(5),
        theme,
        randomize: false,
    }
}

fn credentials(user: &str, api_key: &str) -> Option<ApiCredentials> {
    Some(ApiCredentials {
        user: user.to_string(),
        api_key: api_key.to_string(),
    })
}

/// Matches requests that carry query parameter `0`, whatever its value.
struct HasQueryParam(&'static str);

impl Match for HasQueryParam {
    fn matches(&self, request: &Request) -> bool {
        request.url.query_pairs().any(|(key, _)| key == self.0)
    }
}

#[tokio::test]
async fn test_nekosapi_sends_rating_and_maps_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/images/random"))
        .and(query_param("tags", "catgirl"))
        .and(query_param("limit", "2"))
        .and(query_param("rating", "suggestive"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"url": "https://cdn.example/1.webp", "rating": "suggestive", "tags": ["catgirl", "maid"]},
                {"url": "https://cdn.example/2.webp", "rating": "safe"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = NekosApiProvider::new(reqwest::Client::new())
        .with_base_url(format!("{}/v4/images/random", server.uri()));

    let candidates = provider
        .fetch_candidates(&request(2, UserRating::Suggestive, Theme::Catgirl))
        .await;

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].provider(), ProviderId::NekosApi);
    assert_eq!(candidates[0].rating(), Rating::Suggestive);
    assert_eq!(candidates[0].tags(), ["catgirl", "maid"]);
}

#[tokio::test]
async fn test_nekosapi_omits_rating_for_any() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param_is_missing("rating"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = NekosApiProvider::new(reqwest::Client::new()).with_base_url(server.uri());

    assert!(
        provider
            .fetch_candidates(&request(1, UserRating::Any, Theme::Catgirl))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_waifu_pics_one_call_per_image_and_failures_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sfw/neko"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "https://i.waifu.example/a.png"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sfw/neko"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let provider = WaifuPicsProvider::new(reqwest::Client::new()).with_base_url(server.uri());

    let candidates = provider
        .fetch_candidates(&request(3, UserRating::Safe, Theme::Neko))
        .await;

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].rating(), Rating::Safe);
    assert_eq!(candidates[0].tags(), ["neko", "neko", "waifu.pics"]);
}

#[tokio::test]
async fn test_waifu_pics_femboy_safe_is_empty_without_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = WaifuPicsProvider::new(reqwest::Client::new()).with_base_url(server.uri());

    assert!(
        provider
            .fetch_candidates(&request(2, UserRating::Safe, Theme::Femboy))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_nekos_best_kitsune_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kitsune"))
        .and(query_param("amount", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"url": "https://nekos.example/k1.png"},
                {"url": "https://nekos.example/k2.png"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = NekosBestProvider::new(reqwest::Client::new()).with_base_url(server.uri());

    let candidates = provider
        .fetch_candidates(&request(2, UserRating::Any, Theme::Kitsune))
        .await;

    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.category() == Theme::Kitsune));
}

#[tokio::test]
async fn test_nekos_life_fox_girl_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fox_girl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "https://cdn.nekos.example/f.jpg"})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = NekosLifeProvider::new(reqwest::Client::new()).with_base_url(server.uri());

    let candidates = provider
        .fetch_candidates(&request(1, UserRating::Safe, Theme::Kitsune))
        .await;

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].tags(), ["kitsune", "nekos.life"]);
}

#[tokio::test]
async fn test_nekobot_unsuccessful_payload_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("type", "neko"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": "rate limited"})))
        .expect(2)
        .mount(&server)
        .await;

    let provider = NekobotProvider::new(reqwest::Client::new()).with_base_url(server.uri());

    assert!(
        provider
            .fetch_candidates(&request(2, UserRating::Any, Theme::Catgirl))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_malformed_json_is_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let provider = NekosBestProvider::new(reqwest::Client::new()).with_base_url(server.uri());

    assert!(
        provider
            .fetch_candidates(&request(3, UserRating::Any, Theme::Neko))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_e621_sends_auth_agent_and_rating_tag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .and(query_param("tags", "femboy rating:s"))
        .and(query_param("limit", "2"))
        .and(query_param_is_missing("page"))
        .and(header("user-agent", "test-agent/1.0"))
        // base64("user:key")
        .and(header("authorization", "Basic dXNlcjprZXk="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [
                {"file": {"url": "https://static.e621.example/a.png"}, "rating": "s", "tags": {"general": ["smile"]}},
                {"file": {"url": "https://static.e621.example/b.png"}, "rating": "s", "tags": {}},
                {"file": {"url": "https://static.e621.example/c.png"}, "rating": "s", "tags": {}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = E621Provider::new(reqwest::Client::new(), credentials("user", "key"), "test-agent/1.0")
        .with_base_url(format!("{}/posts.json", server.uri()));

    let candidates = provider
        .fetch_candidates(&request(2, UserRating::Safe, Theme::Femboy))
        .await;

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].rating(), Rating::Safe);
    assert_eq!(candidates[0].tags(), ["femboy", "e621", "smile"]);
}

#[tokio::test]
async fn test_e621_randomized_empty_page_falls_back_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(HasQueryParam("page"))
        .and(query_param("limit", "16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"posts": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param_is_missing("page"))
        .and(query_param("limit", "16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "posts": [
                {"file": {"url": "https://static.e621.example/1.png"}, "rating": "e"},
                {"file": {"url": "https://static.e621.example/2.png"}, "rating": "e"},
                {"file": {"url": "https://static.e621.example/3.png"}, "rating": "e"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = E621Provider::new(reqwest::Client::new(), credentials("user", "key"), "test-agent/1.0")
        .with_base_url(server.uri());
    let mut randomized = request(2, UserRating::Explicit, Theme::Femboy);
    randomized.randomize = true;

    let candidates = provider.fetch_candidates(&randomized).await;

    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.rating() == Rating::Explicit));
}

#[tokio::test]
async fn test_rule34_without_credentials_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let provider = Rule34Provider::new(reqwest::Client::new(), None).with_base_url(server.uri());

    assert!(
        provider
            .fetch_candidates(&request(2, UserRating::Any, Theme::Femboy))
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_rule34_sends_credentials_and_parses_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "dapi"))
        .and(query_param("s", "post"))
        .and(query_param("q", "index"))
        .and(query_param("json", "1"))
        .and(query_param("tags", "femboy rating:explicit"))
        .and(query_param("user_id", "42"))
        .and(query_param("api_key", "secret"))
        .and(query_param_is_missing("pid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"file_url": "//img.rule34.example/1.jpg", "rating": "explicit", "tags": "femboy solo"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Rule34Provider::new(reqwest::Client::new(), credentials("42", "secret"))
        .with_base_url(format!("{}/index.php", server.uri()));

    let candidates = provider
        .fetch_candidates(&request(3, UserRating::Explicit, Theme::Femboy))
        .await;

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].url(), "https://img.rule34.example/1.jpg");
    assert_eq!(candidates[0].rating(), Rating::Explicit);
}
