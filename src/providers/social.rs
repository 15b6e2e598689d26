use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    CombinedAnalysis, PostsProvider, ProfileProvider, ProviderError, ProviderResult,
    TrendSearchProvider, with_timeout,
};
use crate::{
    config::SocialApiConfig,
    models::{Post, ProfileSnapshot, TrendVideo},
};

const PROVIDER: &str = "social";

/// Client for the social-data API: profiles, posts, hashtag trend search,
/// and the combined single-call analysis endpoint.
pub struct SocialApiClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    #[serde(default)]
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct TrendsResponse {
    #[serde(default)]
    videos: Vec<TrendVideo>,
}

#[derive(Debug, Deserialize)]
struct CombinedResponse {
    profile: ProfileSnapshot,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    videos: Vec<TrendVideo>,
}

impl SocialApiClient {
    pub fn new(config: &SocialApiConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            timeout: config.timeout(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        subject: &str,
    ) -> ProviderResult<T> {
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ProviderError::Unavailable {
                        provider: PROVIDER,
                        reason: e.to_string(),
                    }
                } else {
                    ProviderError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(
                PROVIDER,
                status.as_u16(),
                subject,
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode {
                provider: PROVIDER,
                detail: e.to_string(),
            })
    }
}

#[async_trait]
impl ProfileProvider for SocialApiClient {
    #[tracing::instrument(name = "social.fetch_profile", skip(self))]
    async fn fetch_profile(&self, username: &str) -> ProviderResult<ProfileSnapshot> {
        let url = format!("{}/v1/profiles/{}", self.base_url, username);
        with_timeout(PROVIDER, self.timeout, self.get_json(url, username)).await
    }
}

#[async_trait]
impl PostsProvider for SocialApiClient {
    #[tracing::instrument(name = "social.fetch_posts", skip(self))]
    async fn fetch_posts(&self, username: &str, count: usize) -> ProviderResult<Vec<Post>> {
        let url = format!(
            "{}/v1/profiles/{}/posts?count={}",
            self.base_url, username, count
        );
        let response: PostsResponse =
            with_timeout(PROVIDER, self.timeout, self.get_json(url, username)).await?;
        Ok(response.posts)
    }
}

#[async_trait]
impl TrendSearchProvider for SocialApiClient {
    #[tracing::instrument(name = "social.search_trends", skip(self))]
    async fn search_trends(&self, hashtag: &str, count: usize) -> ProviderResult<Vec<TrendVideo>> {
        let url = format!(
            "{}/v1/hashtags/{}/videos?count={}",
            self.base_url, hashtag, count
        );
        let response: TrendsResponse =
            with_timeout(PROVIDER, self.timeout, self.get_json(url, hashtag)).await?;

        let mut videos = response.videos;
        for video in &mut videos {
            video.hashtag = hashtag.to_string();
        }
        Ok(videos)
    }

    #[tracing::instrument(name = "social.analyze_combined", skip(self))]
    async fn analyze_combined(
        &self,
        username: &str,
        max_hashtags: usize,
        videos_per_hashtag: usize,
    ) -> ProviderResult<CombinedAnalysis> {
        let url = format!(
            "{}/v1/profiles/{}/analysis?hashtags={}&videos_per_hashtag={}",
            self.base_url, username, max_hashtags, videos_per_hashtag
        );
        let response: CombinedResponse =
            with_timeout(PROVIDER, self.timeout, self.get_json(url, username)).await?;

        Ok(CombinedAnalysis {
            profile: response.profile,
            hashtags: response.hashtags,
            trends: response.videos,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> SocialApiClient {
        SocialApiClient::new(&SocialApiConfig {
            base_url: server.uri(),
            api_token: "test-token".into(),
            timeout_secs: 5,
            ..SocialApiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fetch_profile_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/profiles/khaby.lame"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "username": "khaby.lame",
                "bio": "If you want to laugh you are in the right place",
                "follower_count": 162_000_000u64,
                "is_verified": true
            })))
            .mount(&server)
            .await;

        let profile = client(&server).fetch_profile("khaby.lame").await.unwrap();
        assert_eq!(profile.username, "khaby.lame");
        assert_eq!(profile.follower_count, 162_000_000);
        assert!(profile.is_verified);
        assert!(profile.niche.is_none());
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/profiles/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).fetch_profile("ghost").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(ref who) if who == "ghost"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/profiles/khaby.lame"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_profile("khaby.lame")
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn search_trends_tags_videos_with_the_hashtag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/hashtags/fitness/videos"))
            .and(query_param("count", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "videos": [
                    { "id": "v1", "views": 1000 },
                    { "id": "v2", "views": 500 }
                ]
            })))
            .mount(&server)
            .await;

        let videos = client(&server).search_trends("fitness", 3).await.unwrap();
        assert_eq!(videos.len(), 2);
        assert!(videos.iter().all(|v| v.hashtag == "fitness"));
    }

    #[tokio::test]
    async fn combined_analysis_parses_all_parts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/profiles/khaby.lame/analysis"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "profile": { "username": "khaby.lame" },
                "hashtags": ["comedy", "reaction"],
                "videos": [{ "id": "v1", "hashtag": "comedy", "views": 10 }]
            })))
            .mount(&server)
            .await;

        let combined = client(&server)
            .analyze_combined("khaby.lame", 5, 8)
            .await
            .unwrap();
        assert_eq!(combined.hashtags, vec!["comedy", "reaction"]);
        assert_eq!(combined.trends.len(), 1);
    }

    #[tokio::test]
    async fn undecodable_body_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/profiles/khaby.lame"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .fetch_profile("khaby.lame")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
        assert!(!err.is_transient());
    }
}
