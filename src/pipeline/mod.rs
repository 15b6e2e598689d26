//! Tiered analysis pipeline.
//!
//! Three strategies, tried strictly in order. A tier advances to the next
//! one only when an upstream is temporarily unavailable; terminal errors
//! (missing profile, rejected credentials, undecodable responses) surface
//! immediately. Each tier assembles its result entirely from its own
//! provider calls — a failed tier contributes nothing to the result of the
//! tier that follows it.

mod progress;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
pub use progress::{ProgressEvent, ProgressReporter, ProgressStage};
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    config::{SocialApiConfig, TtlConfig},
    models::{AnalysisResult, ProfileSnapshot, Tier, TrendVideo, UsageMetadata},
    providers::{
        HashtagDiscovery, PostsProvider, ProfileProvider, ProviderError, ProviderResult,
        TrendSearchProvider,
    },
};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A tier hit an error that no other tier can do better on.
    #[error(transparent)]
    Terminal(ProviderError),

    /// Every tier failed transiently.
    #[error("all analysis tiers unavailable")]
    Exhausted { attempts: Vec<(Tier, ProviderError)> },
}

impl PipelineError {
    /// One-line summary of what each tier died of, for logs and 503 bodies.
    pub fn detail(&self) -> String {
        match self {
            PipelineError::Terminal(e) => e.to_string(),
            PipelineError::Exhausted { attempts } => attempts
                .iter()
                .map(|(tier, e)| format!("{}: {}", tier.as_str(), e))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineLimits {
    pub max_posts: usize,
    pub max_hashtags: usize,
    pub videos_per_hashtag: usize,
    pub result_ttl: Duration,
}

impl PipelineLimits {
    pub fn from_config(social: &SocialApiConfig, ttl: &TtlConfig) -> Self {
        Self {
            max_posts: social.max_posts,
            max_hashtags: social.max_hashtags,
            videos_per_hashtag: social.videos_per_hashtag,
            result_ttl: ttl.result_ttl(),
        }
    }
}

pub struct AnalysisPipeline {
    profile: Arc<dyn ProfileProvider>,
    posts: Arc<dyn PostsProvider>,
    discovery: Arc<dyn HashtagDiscovery>,
    trends: Arc<dyn TrendSearchProvider>,
    limits: PipelineLimits,
}

impl AnalysisPipeline {
    pub fn new(
        profile: Arc<dyn ProfileProvider>,
        posts: Arc<dyn PostsProvider>,
        discovery: Arc<dyn HashtagDiscovery>,
        trends: Arc<dyn TrendSearchProvider>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            profile,
            posts,
            discovery,
            trends,
            limits,
        }
    }

    /// Run the fallback chain for one normalized username.
    #[tracing::instrument(name = "pipeline.run", skip(self, progress))]
    pub async fn run(
        &self,
        username: &str,
        progress: &ProgressReporter,
    ) -> Result<AnalysisResult, PipelineError> {
        let mut attempts = Vec::new();

        for tier in Tier::ALL {
            let started = Instant::now();
            let outcome = match tier {
                Tier::Discovery => self.run_discovery(username, progress, started).await,
                Tier::Granular => self.run_granular(username, progress, started).await,
                Tier::Simple => self.run_simple(username, progress, started).await,
            };

            match outcome {
                Ok(result) => {
                    tracing::info!(
                        tier = tier.as_str(),
                        hashtags = result.usage.hashtag_count,
                        videos = result.usage.video_count,
                        "analysis complete"
                    );
                    progress.complete("analysis complete");
                    return Ok(result);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        tier = tier.as_str(),
                        error = %e,
                        "tier unavailable, advancing"
                    );
                    attempts.push((tier, e));
                }
                Err(e) => return Err(PipelineError::Terminal(e)),
            }
        }

        Err(PipelineError::Exhausted { attempts })
    }

    /// Tier 1: profile fetch, AI niche discovery (auto-geo), trend search.
    async fn run_discovery(
        &self,
        username: &str,
        progress: &ProgressReporter,
        started: Instant,
    ) -> ProviderResult<AnalysisResult> {
        progress.report(ProgressStage::Profile, "fetching profile", 10);
        let mut profile = self.profile.fetch_profile(username).await?;

        progress.report(ProgressStage::Analysis, "discovering niche hashtags", 35);
        let discovered = self
            .discovery
            .discover_for_profile(&profile, self.limits.max_hashtags)
            .await?;
        profile.niche = Some(discovered.niche);

        let hashtags = self.usable_hashtags(discovered.hashtags)?;
        let trends = self.collect_trends(&hashtags, progress, 55, 95).await?;

        Ok(self.assemble(Tier::Discovery, profile, hashtags, trends, started))
    }

    /// Tier 2: every step as its own provider call, with discrete progress.
    async fn run_granular(
        &self,
        username: &str,
        progress: &ProgressReporter,
        started: Instant,
    ) -> ProviderResult<AnalysisResult> {
        progress.report(ProgressStage::Profile, "fetching profile", 10);
        let profile = self.profile.fetch_profile(username).await?;

        progress.report(ProgressStage::Posts, "fetching recent posts", 30);
        let posts = self
            .posts
            .fetch_posts(username, self.limits.max_posts)
            .await?;
        if posts.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "no posts for {}",
                username
            )));
        }

        progress.report(ProgressStage::Analysis, "extracting hashtags", 50);
        let extracted = self
            .discovery
            .extract_from_posts(&profile, &posts, self.limits.max_hashtags)
            .await?;

        let hashtags = self.usable_hashtags(extracted)?;
        let trends = self.collect_trends(&hashtags, progress, 60, 95).await?;

        Ok(self.assemble(Tier::Granular, profile, hashtags, trends, started))
    }

    /// Tier 3: one combined provider call.
    async fn run_simple(
        &self,
        username: &str,
        progress: &ProgressReporter,
        started: Instant,
    ) -> ProviderResult<AnalysisResult> {
        progress.report(ProgressStage::Analysis, "running combined analysis", 40);
        let combined = self
            .trends
            .analyze_combined(
                username,
                self.limits.max_hashtags,
                self.limits.videos_per_hashtag,
            )
            .await?;

        progress.report(ProgressStage::Trends, "collecting trend videos", 85);
        Ok(self.assemble(
            Tier::Simple,
            combined.profile,
            combined.hashtags,
            combined.trends,
            started,
        ))
    }

    fn usable_hashtags(&self, hashtags: Vec<String>) -> ProviderResult<Vec<String>> {
        if hashtags.is_empty() {
            // Nothing to search; treat like an outage so the next tier runs
            return Err(ProviderError::Unavailable {
                provider: "discovery",
                reason: "no usable hashtags produced".into(),
            });
        }
        let mut hashtags = hashtags;
        hashtags.truncate(self.limits.max_hashtags);
        Ok(hashtags)
    }

    /// Search each hashtag, ranking videos by views and keeping the top
    /// `videos_per_hashtag`. Individual hashtag failures are tolerated as
    /// long as at least one search produced videos; zero successes with
    /// transient failures mark the whole tier unavailable.
    async fn collect_trends(
        &self,
        hashtags: &[String],
        progress: &ProgressReporter,
        pct_from: u8,
        pct_to: u8,
    ) -> ProviderResult<Vec<TrendVideo>> {
        let mut trends = Vec::new();
        let mut last_transient = None;
        let total = hashtags.len().max(1);

        for (i, hashtag) in hashtags.iter().enumerate() {
            let span = (pct_to - pct_from) as usize;
            let pct = pct_from + ((span * (i + 1)) / total) as u8;
            progress.report(
                ProgressStage::Trends,
                format!("searching #{}", hashtag),
                pct,
            );

            match self
                .trends
                .search_trends(hashtag, self.limits.videos_per_hashtag)
                .await
            {
                Ok(mut videos) => {
                    videos.sort_by(|a, b| b.views.cmp(&a.views));
                    videos.truncate(self.limits.videos_per_hashtag);
                    trends.extend(videos);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(hashtag = %hashtag, error = %e, "trend search failed");
                    last_transient = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        if trends.is_empty() {
            if let Some(e) = last_transient {
                return Err(e);
            }
        }
        Ok(trends)
    }

    fn assemble(
        &self,
        tier: Tier,
        profile: ProfileSnapshot,
        hashtags: Vec<String>,
        trends: Vec<TrendVideo>,
        started: Instant,
    ) -> AnalysisResult {
        let computed_at = Utc::now();
        let ttl = chrono::Duration::from_std(self.limits.result_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));

        AnalysisResult {
            usage: UsageMetadata {
                tier,
                hashtag_count: hashtags.len(),
                video_count: trends.len(),
                duration_ms: started.elapsed().as_millis() as u64,
            },
            profile,
            hashtags,
            trends,
            computed_at,
            expires_at: computed_at + ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::providers::CombinedAnalysis;
    use crate::providers::test::{Outcome, StaticProviders, sample_video};

    fn limits() -> PipelineLimits {
        PipelineLimits {
            max_posts: 20,
            max_hashtags: 5,
            videos_per_hashtag: 3,
            result_ttl: Duration::from_secs(300),
        }
    }

    fn pipeline(providers: Arc<StaticProviders>) -> AnalysisPipeline {
        AnalysisPipeline::new(
            providers.clone(),
            providers.clone(),
            providers.clone(),
            providers,
            limits(),
        )
    }

    #[tokio::test]
    async fn discovery_tier_wins_when_healthy() {
        let providers = Arc::new(StaticProviders::healthy());
        let pipeline = pipeline(providers.clone());
        let progress = ProgressReporter::disabled();

        let result = pipeline.run("khaby.lame", &progress).await.unwrap();

        assert_eq!(result.usage.tier, Tier::Discovery);
        assert_eq!(result.hashtags, vec!["niche_travel", "niche_food"]);
        assert!(result.profile.niche.is_some());
        assert_eq!(result.usage.video_count, result.trends.len());
        // Later tiers were never touched
        assert_eq!(
            providers.calls.extract.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
        assert_eq!(
            providers.calls.combined.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn granular_result_contains_only_granular_data() {
        let providers = Arc::new(StaticProviders::discovery_down());
        let pipeline = pipeline(providers.clone());
        let progress = ProgressReporter::disabled();

        let result = pipeline.run("khaby.lame", &progress).await.unwrap();

        assert_eq!(result.usage.tier, Tier::Granular);
        // Hashtags come from caption extraction, not from the failed
        // discovery tier
        assert_eq!(result.hashtags, vec!["caption_travel", "caption_food"]);
        assert!(result.trends.iter().all(|v| v.hashtag.starts_with("caption_")));
        // Granular never saw discovery's niche
        assert!(result.profile.niche.is_none());
    }

    #[tokio::test]
    async fn simple_tier_is_the_last_resort() {
        let providers = Arc::new(StaticProviders {
            discover_outcome: Outcome::Unavailable,
            extract_outcome: Outcome::Unavailable,
            ..StaticProviders::default()
        });
        let pipeline = pipeline(providers.clone());
        let progress = ProgressReporter::disabled();

        let result = pipeline.run("khaby.lame", &progress).await.unwrap();
        assert_eq!(result.usage.tier, Tier::Simple);
        assert_eq!(result.hashtags, vec!["combined_fallback"]);
    }

    /// Returns more videos than the cap, in scrambled view order.
    struct ScrambledTrends;

    #[async_trait]
    impl TrendSearchProvider for ScrambledTrends {
        async fn search_trends(
            &self,
            hashtag: &str,
            _count: usize,
        ) -> ProviderResult<Vec<TrendVideo>> {
            Ok([250u64, 900, 100, 600, 400]
                .iter()
                .enumerate()
                .map(|(i, &views)| sample_video(&format!("v{}", i), hashtag, views))
                .collect())
        }

        async fn analyze_combined(
            &self,
            _username: &str,
            _max_hashtags: usize,
            _videos_per_hashtag: usize,
        ) -> ProviderResult<CombinedAnalysis> {
            Err(ProviderError::Unavailable {
                provider: "static",
                reason: "not used".into(),
            })
        }
    }

    #[tokio::test]
    async fn trend_videos_are_ranked_by_views_and_capped() {
        let providers = Arc::new(StaticProviders::healthy());
        let pipeline = AnalysisPipeline::new(
            providers.clone(),
            providers.clone(),
            providers,
            Arc::new(ScrambledTrends),
            limits(),
        );
        let progress = ProgressReporter::disabled();

        let trends = pipeline
            .collect_trends(&["fitness".into()], &progress, 60, 95)
            .await
            .unwrap();

        // Top videos_per_hashtag by view count, best first
        let views: Vec<u64> = trends.iter().map(|v| v.views).collect();
        assert_eq!(views, vec![900, 600, 400]);
    }

    #[tokio::test]
    async fn exhausted_when_everything_is_down() {
        let providers = Arc::new(StaticProviders::all_down());
        let pipeline = pipeline(providers);
        let progress = ProgressReporter::disabled();

        let err = pipeline.run("khaby.lame", &progress).await.unwrap_err();
        match err {
            PipelineError::Exhausted { attempts } => {
                assert_eq!(attempts.len(), 3);
                assert_eq!(attempts[0].0, Tier::Discovery);
                assert_eq!(attempts[2].0, Tier::Simple);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_profile_is_terminal() {
        let providers = Arc::new(StaticProviders {
            profile_outcome: Outcome::NotFound,
            ..StaticProviders::default()
        });
        let pipeline = pipeline(providers.clone());
        let progress = ProgressReporter::disabled();

        let err = pipeline.run("ghost", &progress).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Terminal(ProviderError::NotFound(_))
        ));
        // No fallback attempted after a terminal error
        assert_eq!(
            providers.calls.combined.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn empty_post_history_is_terminal_in_granular() {
        let providers = Arc::new(StaticProviders {
            discover_outcome: Outcome::Unavailable,
            posts: Vec::new(),
            ..StaticProviders::default()
        });
        let pipeline = pipeline(providers);
        let progress = ProgressReporter::disabled();

        let err = pipeline.run("quietuser", &progress).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Terminal(ProviderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn progress_is_monotonic_across_tier_transitions() {
        let providers = Arc::new(StaticProviders::discovery_down());
        let pipeline = pipeline(providers);
        let (progress, mut rx) = ProgressReporter::channel();

        pipeline.run("khaby.lame", &progress).await.unwrap();
        drop(progress);

        let mut last = 0u8;
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            assert!(ev.percentage >= last);
            last = ev.percentage;
            events.push(ev);
        }
        assert_eq!(last, 100);
        assert_eq!(events.last().unwrap().stage, ProgressStage::Complete);
        // The granular tier reported its discrete steps
        assert!(events.iter().any(|e| e.stage == ProgressStage::Posts));
        assert!(events.iter().any(|e| e.stage == ProgressStage::Trends));
    }
}
