use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{HashtagDiscovery, NicheHashtags, ProviderError, ProviderResult, with_timeout};
use crate::{
    config::DiscoveryApiConfig,
    models::{NicheSummary, Post, ProfileSnapshot},
    normalize,
};

const PROVIDER: &str = "discovery";

/// Client for the AI discovery service (OpenAI-style chat-completions API).
///
/// Two jobs: rank the hashtags that best represent a profile from its post
/// captions, and discover niche hashtags from the profile alone — the model
/// infers the creator's geography and language from the bio, so no location
/// input is required ("auto-geo").
pub struct DiscoveryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Payload the niche-discovery prompt asks the model to produce.
#[derive(Deserialize)]
struct NichePayload {
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    key_topics: Vec<String>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    hashtags: Vec<String>,
}

impl DiscoveryClient {
    pub fn new(config: &DiscoveryApiConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        })
    }

    async fn chat(&self, system: &str, user: String) -> ProviderResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
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
                "completion",
            ));
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::Decode {
                    provider: PROVIDER,
                    detail: e.to_string(),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ProviderError::Decode {
                provider: PROVIDER,
                detail: "empty choices".into(),
            })
    }

    /// Models often wrap JSON answers in markdown fences despite
    /// instructions; strip them before parsing.
    fn strip_code_fences(content: &str) -> &str {
        let trimmed = content.trim();
        let Some(inner) = trimmed.strip_prefix("```") else {
            return trimmed;
        };
        let inner = inner.strip_prefix("json").unwrap_or(inner);
        inner.strip_suffix("```").unwrap_or(inner).trim()
    }

    fn clean_tags(raw: Vec<String>, max: usize) -> Vec<String> {
        let mut tags = Vec::new();
        for tag in raw {
            if let Ok(cleaned) = normalize::clean_hashtag(&tag) {
                if !tags.contains(&cleaned) {
                    tags.push(cleaned);
                }
            }
            if tags.len() == max {
                break;
            }
        }
        tags
    }
}

#[async_trait]
impl HashtagDiscovery for DiscoveryClient {
    #[tracing::instrument(name = "discovery.extract_from_posts", skip(self, profile, posts))]
    async fn extract_from_posts(
        &self,
        profile: &ProfileSnapshot,
        posts: &[Post],
        max: usize,
    ) -> ProviderResult<Vec<String>> {
        let captions: Vec<&str> = posts
            .iter()
            .map(|p| p.caption.as_str())
            .filter(|c| !c.is_empty())
            .collect();

        let prompt = format!(
            "Creator @{} (bio: {:?}) recently posted these captions:\n{}\n\
             Pick the {} hashtags that best represent this creator's content. \
             Respond with a JSON array of hashtag strings, nothing else.",
            profile.username,
            profile.bio,
            captions.join("\n"),
            max,
        );

        let content = with_timeout(
            PROVIDER,
            self.timeout,
            self.chat(
                "You analyze social media creators and identify their most representative hashtags.",
                prompt,
            ),
        )
        .await?;

        let raw: Vec<String> = serde_json::from_str(Self::strip_code_fences(&content))
            .map_err(|e| ProviderError::Decode {
                provider: PROVIDER,
                detail: format!("expected a JSON array of hashtags: {}", e),
            })?;

        let mut tags = Self::clean_tags(raw, max);
        // Top up a short answer with hashtags taken verbatim from captions
        if tags.len() < max {
            for tag in captions.iter().flat_map(|c| normalize::extract_hashtags(c)) {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
                if tags.len() == max {
                    break;
                }
            }
        }
        Ok(tags)
    }

    #[tracing::instrument(name = "discovery.discover_for_profile", skip(self, profile))]
    async fn discover_for_profile(
        &self,
        profile: &ProfileSnapshot,
        max: usize,
    ) -> ProviderResult<NicheHashtags> {
        let prompt = format!(
            "Profile @{}: bio {:?}, {} followers, {} videos. \
             Infer the creator's niche, and from the bio alone infer their \
             likely language and region. Suggest {} trending hashtags popular \
             in that region and niche. Respond with a JSON object with keys \
             category, description, key_topics, language, region, hashtags.",
            profile.username, profile.bio, profile.follower_count, profile.video_count, max,
        );

        let content = with_timeout(
            PROVIDER,
            self.timeout,
            self.chat(
                "You are a trend researcher who identifies creator niches and regional hashtag trends.",
                prompt,
            ),
        )
        .await?;

        let payload: NichePayload = serde_json::from_str(Self::strip_code_fences(&content))
            .map_err(|e| ProviderError::Decode {
                provider: PROVIDER,
                detail: format!("expected a niche JSON object: {}", e),
            })?;

        Ok(NicheHashtags {
            hashtags: Self::clean_tags(payload.hashtags, max),
            niche: NicheSummary {
                category: payload.category,
                description: payload.description,
                key_topics: payload.key_topics,
                language: payload.language,
                region: payload.region,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> DiscoveryClient {
        DiscoveryClient::new(&DiscoveryApiConfig {
            base_url: server.uri(),
            api_key: "sk-test".into(),
            timeout_secs: 5,
            ..DiscoveryApiConfig::default()
        })
        .unwrap()
    }

    fn profile() -> ProfileSnapshot {
        ProfileSnapshot {
            username: "khaby.lame".into(),
            display_name: None,
            bio: "comedy".into(),
            follower_count: 100,
            following_count: 10,
            likes_count: 0,
            video_count: 50,
            avatar_url: None,
            is_verified: false,
            niche: None,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    }

    #[tokio::test]
    async fn extracts_and_cleans_hashtags() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r##"["#Comedy", "reaction", "comedy", "bad tag", "funny"]"##,
            )))
            .mount(&server)
            .await;

        let tags = client(&server)
            .extract_from_posts(&profile(), &[], 3)
            .await
            .unwrap();
        // Cleaned, deduplicated, capped at 3
        assert_eq!(tags, vec!["comedy", "reaction", "funny"]);
    }

    #[tokio::test]
    async fn strips_markdown_fences() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "```json\n[\"fitness\", \"workout\"]\n```",
            )))
            .mount(&server)
            .await;

        let tags = client(&server)
            .extract_from_posts(&profile(), &[], 5)
            .await
            .unwrap();
        assert_eq!(tags, vec!["fitness", "workout"]);
    }

    #[tokio::test]
    async fn short_answers_are_topped_up_from_captions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"["comedy"]"#)))
            .mount(&server)
            .await;

        let posts = vec![
            crate::models::Post {
                id: "p1".into(),
                caption: "New video! #Comedy #reaction #funny".into(),
                views: 0,
                likes: 0,
                comments: 0,
                shares: 0,
                created_at: None,
                video_url: None,
                cover_url: None,
            },
        ];

        let tags = client(&server)
            .extract_from_posts(&profile(), &posts, 3)
            .await
            .unwrap();
        assert_eq!(tags, vec!["comedy", "reaction", "funny"]);
    }

    #[tokio::test]
    async fn discover_parses_niche_payload() {
        let server = MockServer::start().await;
        let body = json!({
            "category": "Comedy",
            "description": "Short-form silent comedy",
            "key_topics": ["reactions", "life hacks"],
            "language": "it",
            "region": "IT",
            "hashtags": ["comedy", "commediaitaliana"]
        });
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion(&body.to_string())),
            )
            .mount(&server)
            .await;

        let discovered = client(&server)
            .discover_for_profile(&profile(), 5)
            .await
            .unwrap();
        assert_eq!(discovered.niche.category, "Comedy");
        assert_eq!(discovered.niche.region.as_deref(), Some("IT"));
        assert_eq!(discovered.hashtags, vec!["comedy", "commediaitaliana"]);
    }

    #[tokio::test]
    async fn non_json_answer_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("Sure! Here are some hashtags: #comedy")),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .extract_from_posts(&profile(), &[], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
    }

    #[tokio::test]
    async fn rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server)
            .discover_for_profile(&profile(), 5)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
