use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::ConfigError;

/// Upstream provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Social-data API (profiles, posts, hashtag trend search).
    #[serde(default)]
    pub social: SocialApiConfig,

    /// AI discovery API (hashtag extraction, auto-geo niche discovery).
    #[serde(default)]
    pub discovery: DiscoveryApiConfig,
}

impl ProvidersConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.social.validate()?;
        self.discovery.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialApiConfig {
    #[serde(default = "default_social_base_url")]
    pub base_url: String,

    /// API token. Interpolate from the environment in production:
    /// `api_token = "${SOCIAL_API_TOKEN}"`.
    #[serde(default)]
    pub api_token: String,

    /// Per-request timeout in seconds. Elapsed timeouts count as upstream
    /// unavailability and advance the fallback tier.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Posts fetched per profile in the granular tier.
    #[serde(default = "default_max_posts")]
    pub max_posts: usize,

    /// Hashtags analyzed per request.
    #[serde(default = "default_max_hashtags")]
    pub max_hashtags: usize,

    /// Trend videos kept per hashtag.
    #[serde(default = "default_videos_per_hashtag")]
    pub videos_per_hashtag: usize,
}

impl Default for SocialApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_social_base_url(),
            api_token: String::new(),
            timeout_secs: default_timeout_secs(),
            max_posts: default_max_posts(),
            max_hashtags: default_max_hashtags(),
            videos_per_hashtag: default_videos_per_hashtag(),
        }
    }
}

impl SocialApiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!("social base_url is not a valid URL: {}", e))
        })?;
        if self.max_hashtags == 0 || self.videos_per_hashtag == 0 || self.max_posts == 0 {
            return Err(ConfigError::Validation(
                "social max_posts, max_hashtags, and videos_per_hashtag must be greater than 0"
                    .into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryApiConfig {
    #[serde(default = "default_discovery_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DiscoveryApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_discovery_base_url(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl DiscoveryApiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Validation(format!("discovery base_url is not a valid URL: {}", e))
        })?;
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Validation(
                "discovery temperature must be between 0.0 and 2.0".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_social_base_url() -> String {
    "https://api.socialdata.example".to_string()
}

fn default_discovery_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_posts() -> usize {
    20
}

fn default_max_hashtags() -> usize {
    5
}

fn default_videos_per_hashtag() -> usize {
    8
}
