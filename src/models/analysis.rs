use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a creator profile as returned by the social-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    /// Populated by the discovery tier, absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche: Option<NicheSummary>,
}

/// AI-inferred niche description, including the geography and language
/// derived from the profile itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicheSummary {
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// A single post from the analyzed profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

/// A trending video found under one of the analyzed hashtags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendVideo {
    pub id: String,
    #[serde(default)]
    pub caption: String,
    /// The hashtag this video was discovered under.
    #[serde(default)]
    pub hashtag: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub author: Option<TrendAuthor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAuthor {
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Which fallback tier produced a result.
///
/// Tiers are tried strictly in declaration order; a result is built entirely
/// by one tier, never assembled from pieces of several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Profile fetch + AI niche discovery (auto-geo) + hashtag trend search.
    Discovery,
    /// Profile, posts, caption hashtag extraction, and trend search as
    /// separate provider calls with step-by-step progress.
    Granular,
    /// One combined provider call.
    Simple,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Discovery, Tier::Granular, Tier::Simple];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Discovery => "discovery",
            Tier::Granular => "granular",
            Tier::Simple => "simple",
        }
    }
}

/// Bookkeeping attached to every analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub tier: Tier,
    pub hashtag_count: usize,
    pub video_count: usize,
    pub duration_ms: u64,
}

/// The complete, cacheable output of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub profile: ProfileSnapshot,
    /// Ordered, deduplicated hashtags the analysis was built around.
    pub hashtags: Vec<String>,
    /// Trend videos in discovery order; ranked by views within each hashtag.
    pub trends: Vec<TrendVideo>,
    pub usage: UsageMetadata,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
