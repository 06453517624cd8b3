//! Articles, scores, and the selected story.
//!
//! An `Article` is immutable once fetched. Its id is a stable hash of the
//! canonical URL so the same story fetched twice deduplicates to one candidate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// A candidate news article produced by an article source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Stable id: hex sha256 of the canonical URL
    pub id: String,

    /// Canonical URL (scheme + host + path, query and fragment stripped)
    pub url: String,

    /// Headline
    pub title: String,

    /// Full body text
    pub body: String,

    /// Publish timestamp, if the source provided one
    pub published: Option<DateTime<Utc>>,

    /// Source domain (host without leading "www.")
    pub source_domain: String,

    /// Image URLs attached to the article, best first
    #[serde(default)]
    pub image_urls: Vec<String>,

    /// External engagement signal (shares/comments), when available
    #[serde(default)]
    pub engagement: Option<f64>,
}

impl Article {
    /// Build an article from raw scraped fields, canonicalizing the URL.
    ///
    /// Returns `None` when the URL does not parse; an article we cannot
    /// identify cannot be deduplicated or attributed.
    pub fn from_raw(
        url: &str,
        title: impl Into<String>,
        body: impl Into<String>,
        published: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let domain = host.strip_prefix("www.").unwrap_or(host).to_string();
        let canonical = format!("{}://{}{}", parsed.scheme(), host, parsed.path());

        Some(Self {
            id: article_id(&canonical),
            url: canonical,
            title: title.into(),
            body: body.into(),
            published,
            source_domain: domain,
            image_urls: Vec::new(),
            engagement: None,
        })
    }

    pub fn with_images(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = image_urls;
        self
    }

    pub fn with_engagement(mut self, engagement: f64) -> Self {
        self.engagement = Some(engagement);
        self
    }

    /// Word count of the body text
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }

    /// Age in hours relative to `now`, if the publish timestamp is known
    pub fn age_hours(&self, now: DateTime<Utc>) -> Option<f64> {
        self.published
            .map(|p| (now - p).num_seconds() as f64 / 3600.0)
    }
}

/// Stable article id from a canonical URL
pub fn article_id(canonical_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Drop duplicate articles (same canonical URL), keeping first occurrence order.
pub fn dedup_articles(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = std::collections::HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}

/// Per-criterion score contributions, already weighted.
///
/// The total score is the sum of the fields, so the breakdown always explains
/// the final number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub keyword_impact: f64,
    pub recency: f64,
    pub source_authority: f64,
    pub length: f64,
    pub engagement: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.keyword_impact + self.recency + self.source_authority + self.length + self.engagement
    }
}

/// An article with its ranking score. Derived per run, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredArticle {
    pub article: Article,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// The single article selected for this run's video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story(pub ScoredArticle);

impl Story {
    pub fn id(&self) -> &str {
        &self.0.article.id
    }

    pub fn title(&self) -> &str {
        &self.0.article.title
    }

    pub fn article(&self) -> &Article {
        &self.0.article
    }

    pub fn score(&self) -> f64 {
        self.0.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_url_strips_query_and_fragment() {
        let a = Article::from_raw(
            "https://www.example.com/story/1?utm_source=rss#top",
            "Title",
            "Body",
            None,
        )
        .unwrap();

        assert_eq!(a.url, "https://www.example.com/story/1");
        assert_eq!(a.source_domain, "example.com");
    }

    #[test]
    fn test_same_url_same_id() {
        let a = Article::from_raw("https://example.com/a?x=1", "A", "", None).unwrap();
        let b = Article::from_raw("https://example.com/a?x=2", "B", "", None).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let a = Article::from_raw("https://example.com/a", "first", "", None).unwrap();
        let b = Article::from_raw("https://example.com/a", "second", "", None).unwrap();
        let c = Article::from_raw("https://example.com/c", "other", "", None).unwrap();

        let out = dedup_articles(vec![a, b, c]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "first");
    }

    #[test]
    fn test_unparseable_url_rejected() {
        assert!(Article::from_raw("not a url", "t", "b", None).is_none());
    }

    #[test]
    fn test_breakdown_total() {
        let b = ScoreBreakdown {
            keyword_impact: 0.3,
            recency: 0.25,
            source_authority: 0.1,
            length: 0.15,
            engagement: 0.0,
        };
        assert!((b.total() - 0.8).abs() < 1e-9);
    }
}
