//! Upstream provider clients and the trait seams the pipeline runs on.
//!
//! Errors are classified into transient (the upstream is temporarily
//! unavailable: timeouts, connect failures, 429/5xx) and terminal
//! (missing profile, rejected request, undecodable response). Only
//! transient errors advance the fallback tier.

mod discovery;
mod social;

use std::time::Duration;

use async_trait::async_trait;
pub use discovery::DiscoveryClient;
pub use social::SocialApiClient;
use thiserror::Error;

use crate::models::{NicheSummary, Post, ProfileSnapshot, TrendVideo};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{provider} unavailable: {reason}")]
    Unavailable {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} rejected the request with status {status}")]
    Rejected { provider: &'static str, status: u16 },

    #[error("{provider} returned an unexpected response: {detail}")]
    Decode {
        provider: &'static str,
        detail: String,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether the error indicates temporary upstream unavailability.
    /// Transient errors advance the fallback tier; everything else is
    /// surfaced to the caller immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Unavailable { .. } => true,
            ProviderError::Request(e) => e.is_timeout() || e.is_connect(),
            ProviderError::NotFound(_)
            | ProviderError::Rejected { .. }
            | ProviderError::Decode { .. } => false,
        }
    }

    /// Classify a non-success HTTP status: 404 means the subject doesn't
    /// exist, 429 and 5xx mean the upstream is struggling, any other 4xx is
    /// a terminal rejection.
    pub(crate) fn from_status(provider: &'static str, status: u16, subject: &str) -> Self {
        match status {
            404 => ProviderError::NotFound(subject.to_string()),
            429 | 500..=599 => ProviderError::Unavailable {
                provider,
                reason: format!("status {}", status),
            },
            _ => ProviderError::Rejected { provider, status },
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Wrap a provider call in a deadline. An elapsed deadline is
/// indistinguishable from an unreachable upstream, so it maps to
/// `Unavailable` and advances the tier.
pub(crate) async fn with_timeout<T, F>(
    provider: &'static str,
    limit: Duration,
    fut: F,
) -> ProviderResult<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Unavailable {
            provider,
            reason: format!("timed out after {:?}", limit),
        }),
    }
}

/// Hashtags discovered for a profile's niche, with the inferred niche
/// description (geography and language included).
#[derive(Debug, Clone, PartialEq)]
pub struct NicheHashtags {
    pub hashtags: Vec<String>,
    pub niche: NicheSummary,
}

/// Everything the simple tier needs from a single combined call.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedAnalysis {
    pub profile: ProfileSnapshot,
    pub hashtags: Vec<String>,
    pub trends: Vec<TrendVideo>,
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn fetch_profile(&self, username: &str) -> ProviderResult<ProfileSnapshot>;
}

#[async_trait]
pub trait PostsProvider: Send + Sync {
    async fn fetch_posts(&self, username: &str, count: usize) -> ProviderResult<Vec<Post>>;
}

#[async_trait]
pub trait HashtagDiscovery: Send + Sync {
    /// Extract the hashtags that best represent the profile from its recent
    /// post captions.
    async fn extract_from_posts(
        &self,
        profile: &ProfileSnapshot,
        posts: &[Post],
        max: usize,
    ) -> ProviderResult<Vec<String>>;

    /// Discover niche hashtags from the profile alone, inferring the
    /// geography and language from the profile itself.
    async fn discover_for_profile(
        &self,
        profile: &ProfileSnapshot,
        max: usize,
    ) -> ProviderResult<NicheHashtags>;
}

#[async_trait]
pub trait TrendSearchProvider: Send + Sync {
    /// Trending videos for one hashtag, best first.
    async fn search_trends(&self, hashtag: &str, count: usize) -> ProviderResult<Vec<TrendVideo>>;

    /// Single-call profile analysis: profile, hashtags, and trend videos in
    /// one response. The simple tier's only provider call.
    async fn analyze_combined(
        &self,
        username: &str,
        max_hashtags: usize,
        videos_per_hashtag: usize,
    ) -> ProviderResult<CombinedAnalysis>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(
            ProviderError::Unavailable {
                provider: "social",
                reason: "status 503".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::NotFound("khaby.lame".into()).is_transient());
        assert!(
            !ProviderError::Rejected {
                provider: "social",
                status: 401
            }
            .is_transient()
        );
        assert!(
            !ProviderError::Decode {
                provider: "discovery",
                detail: "bad json".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            ProviderError::from_status("social", 404, "khaby.lame"),
            ProviderError::NotFound(_)
        ));
        assert!(matches!(
            ProviderError::from_status("social", 429, "x"),
            ProviderError::Unavailable { .. }
        ));
        assert!(matches!(
            ProviderError::from_status("social", 503, "x"),
            ProviderError::Unavailable { .. }
        ));
        assert!(matches!(
            ProviderError::from_status("social", 401, "x"),
            ProviderError::Rejected { status: 401, .. }
        ));
    }

    #[tokio::test]
    async fn with_timeout_maps_elapse_to_unavailable() {
        let result: ProviderResult<()> = with_timeout("social", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(e) => assert!(e.is_transient()),
            Ok(_) => panic!("expected timeout"),
        }
    }
}
