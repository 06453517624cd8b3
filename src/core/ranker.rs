//! Story ranking: scores and totally orders candidate articles.
//!
//! The score is a weighted sum of independent sub-scores, each clamped to
//! [0, 1] before weighting, so the breakdown always explains the total and no
//! single criterion can run away. Articles matching an exclusion keyword are
//! zeroed rather than removed, which keeps the output a total order over the
//! input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{dedup_articles, Article, ScoreBreakdown, ScoredArticle};

/// Criterion weights. These multiply sub-scores already clamped to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_w_keyword")]
    pub keyword_impact: f64,
    #[serde(default = "default_w_recency")]
    pub recency: f64,
    #[serde(default = "default_w_authority")]
    pub source_authority: f64,
    #[serde(default = "default_w_length")]
    pub length: f64,
    #[serde(default = "default_w_engagement")]
    pub engagement: f64,
}

fn default_w_keyword() -> f64 {
    0.35
}
fn default_w_recency() -> f64 {
    0.25
}
fn default_w_authority() -> f64 {
    0.15
}
fn default_w_length() -> f64 {
    0.15
}
fn default_w_engagement() -> f64 {
    0.10
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            keyword_impact: default_w_keyword(),
            recency: default_w_recency(),
            source_authority: default_w_authority(),
            length: default_w_length(),
            engagement: default_w_engagement(),
        }
    }
}

/// A source domain with its authority weight. List order is the authority
/// rank used as the tertiary tie-break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityEntry {
    pub domain: String,
    pub weight: f64,
}

/// Ranking parameters, all externally configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default)]
    pub weights: ScoreWeights,

    /// Curated high-impact keyword list
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Articles containing any of these are zeroed (promotional/off-topic)
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// Keyword matches beyond this cap add nothing (diminishing returns)
    #[serde(default = "default_keyword_cap")]
    pub keyword_cap: usize,

    /// Age under this many hours scores full recency
    #[serde(default = "default_fresh_hours")]
    pub fresh_hours: f64,

    /// Recency decays linearly to zero at this age
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: f64,

    /// Word count below this scores zero for length
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Word count at which length saturates at 1.0
    #[serde(default = "default_target_words")]
    pub target_words: usize,

    /// Engagement signal that saturates the engagement sub-score
    #[serde(default = "default_engagement_saturation")]
    pub engagement_saturation: f64,

    /// Fixed authority list, ordered by priority (tie-break rank)
    #[serde(default = "default_authority")]
    pub authority: Vec<AuthorityEntry>,

    /// Weight for domains not in the authority list. Low but never zero:
    /// unknown is not penalized to exclusion.
    #[serde(default = "default_unknown_authority")]
    pub default_authority: f64,
}

fn default_keyword_cap() -> usize {
    5
}
fn default_fresh_hours() -> f64 {
    24.0
}
fn default_horizon_hours() -> f64 {
    72.0
}
fn default_min_words() -> usize {
    500
}
fn default_target_words() -> usize {
    800
}
fn default_engagement_saturation() -> f64 {
    500.0
}
fn default_unknown_authority() -> f64 {
    0.2
}

fn default_keywords() -> Vec<String> {
    [
        "artificial intelligence",
        "machine learning",
        "deep learning",
        "neural network",
        "large language model",
        "llm",
        "gpt",
        "chatgpt",
        "claude",
        "gemini",
        "openai",
        "anthropic",
        "deepmind",
        "generative ai",
        "transformer",
        "diffusion model",
        "foundation model",
        "ai model",
        "ai chip",
        "ai regulation",
        "ai safety",
        "robotics",
        "computer vision",
        "speech recognition",
        "reinforcement learning",
        "agi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclusions() -> Vec<String> {
    [
        "coupon", "discount code", "best deals", "sponsored", "giveaway", "sweepstakes",
        "horoscope", "betting odds", "casino", "promo code",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_authority() -> Vec<AuthorityEntry> {
    [
        ("reuters.com", 1.0),
        ("apnews.com", 0.95),
        ("bbc.com", 0.9),
        ("theverge.com", 0.85),
        ("arstechnica.com", 0.85),
        ("technologyreview.com", 0.8),
        ("wired.com", 0.8),
        ("techcrunch.com", 0.75),
        ("venturebeat.com", 0.7),
        ("engadget.com", 0.65),
    ]
    .iter()
    .map(|(d, w)| AuthorityEntry {
        domain: d.to_string(),
        weight: *w,
    })
    .collect()
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            keywords: default_keywords(),
            exclusions: default_exclusions(),
            keyword_cap: default_keyword_cap(),
            fresh_hours: default_fresh_hours(),
            horizon_hours: default_horizon_hours(),
            min_words: default_min_words(),
            target_words: default_target_words(),
            engagement_saturation: default_engagement_saturation(),
            authority: default_authority(),
            default_authority: default_unknown_authority(),
        }
    }
}

/// Scores and totally orders candidate articles.
#[derive(Debug, Clone, Default)]
pub struct StoryRanker {
    config: RankingConfig,
}

impl StoryRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Rank articles descending by score.
    ///
    /// Articles sharing a canonical URL are collapsed to the first occurrence
    /// before scoring, whatever source produced them. Ties break by
    /// more-recent publish timestamp, then source authority rank, then
    /// article id, so re-ranking the same input is deterministic. Empty input
    /// yields empty output.
    pub fn rank(&self, articles: Vec<Article>, now: DateTime<Utc>) -> Vec<ScoredArticle> {
        let mut scored: Vec<ScoredArticle> = dedup_articles(articles)
            .into_iter()
            .map(|a| self.score(a, now))
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.article.published.cmp(&a.article.published))
                .then_with(|| {
                    self.authority_rank(&a.article.source_domain)
                        .cmp(&self.authority_rank(&b.article.source_domain))
                })
                .then_with(|| a.article.id.cmp(&b.article.id))
        });

        scored
    }

    /// Score one article against the configured criteria.
    pub fn score(&self, article: Article, now: DateTime<Utc>) -> ScoredArticle {
        if let Some(term) = self.excluded_by(&article) {
            debug!(title = %article.title, term, "Article excluded");
            return ScoredArticle {
                article,
                score: 0.0,
                breakdown: ScoreBreakdown::default(),
            };
        }

        let w = &self.config.weights;
        let breakdown = ScoreBreakdown {
            keyword_impact: w.keyword_impact * self.keyword_sub_score(&article),
            recency: w.recency * self.recency_sub_score(&article, now),
            source_authority: w.source_authority * self.authority_sub_score(&article),
            length: w.length * self.length_sub_score(&article),
            engagement: w.engagement * self.engagement_sub_score(&article),
        };

        ScoredArticle {
            score: breakdown.total(),
            breakdown,
            article,
        }
    }

    fn excluded_by(&self, article: &Article) -> Option<&str> {
        let text = format!("{} {}", article.title, article.body).to_lowercase();
        self.config
            .exclusions
            .iter()
            .find(|term| text.contains(term.to_lowercase().as_str()))
            .map(|s| s.as_str())
    }

    fn keyword_sub_score(&self, article: &Article) -> f64 {
        if self.config.keyword_cap == 0 || self.config.keywords.is_empty() {
            return 0.0;
        }
        let text = format!("{} {}", article.title, article.body).to_lowercase();
        let matches = self
            .config
            .keywords
            .iter()
            .filter(|k| text.contains(k.to_lowercase().as_str()))
            .count();

        (matches.min(self.config.keyword_cap) as f64) / self.config.keyword_cap as f64
    }

    fn recency_sub_score(&self, article: &Article, now: DateTime<Utc>) -> f64 {
        let Some(age) = article.age_hours(now) else {
            return 0.0;
        };
        let fresh = self.config.fresh_hours;
        let horizon = self.config.horizon_hours;

        if age < fresh {
            1.0
        } else if age >= horizon || horizon <= fresh {
            0.0
        } else {
            (horizon - age) / (horizon - fresh)
        }
    }

    fn authority_sub_score(&self, article: &Article) -> f64 {
        self.config
            .authority
            .iter()
            .find(|e| e.domain == article.source_domain)
            .map(|e| e.weight.clamp(0.0, 1.0))
            .unwrap_or(self.config.default_authority)
    }

    fn length_sub_score(&self, article: &Article) -> f64 {
        let words = article.word_count();
        let min = self.config.min_words;
        let target = self.config.target_words;

        if words < min {
            0.0
        } else if words >= target || target <= min {
            1.0
        } else {
            (words - min) as f64 / (target - min) as f64
        }
    }

    fn engagement_sub_score(&self, article: &Article) -> f64 {
        match article.engagement {
            // Absence of signal contributes exactly zero; it must not bias
            // missing-data articles below the honest absence of signal.
            None => 0.0,
            Some(e) => (e / self.config.engagement_saturation).clamp(0.0, 1.0),
        }
    }

    /// Position in the fixed authority list; unlisted domains rank last.
    pub fn authority_rank(&self, domain: &str) -> usize {
        self.config
            .authority
            .iter()
            .position(|e| e.domain == domain)
            .unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn article(url: &str, title: &str, words: usize, age_hours: i64) -> Article {
        let body = "word ".repeat(words);
        Article::from_raw(
            url,
            title,
            body.trim(),
            Some(Utc::now() - Duration::hours(age_hours)),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_input_empty_output() {
        let ranker = StoryRanker::default();
        assert!(ranker.rank(vec![], Utc::now()).is_empty());
    }

    #[test]
    fn test_keyword_cap_diminishing_returns() {
        let ranker = StoryRanker::default();
        let few = article(
            "https://example.com/few",
            "chatgpt update",
            600,
            1,
        );
        let many = article(
            "https://example.com/many",
            "openai anthropic deepmind chatgpt claude gemini llm gpt artificial intelligence machine learning",
            600,
            1,
        );

        let few_score = ranker.score(few, Utc::now());
        let many_score = ranker.score(many, Utc::now());

        assert!(many_score.breakdown.keyword_impact > few_score.breakdown.keyword_impact);
        // Capped: cannot exceed the full keyword weight
        assert!(many_score.breakdown.keyword_impact <= default_w_keyword() + 1e-9);
    }

    #[test]
    fn test_recency_decay() {
        let ranker = StoryRanker::default();
        let now = Utc::now();

        let fresh = ranker.score(article("https://example.com/a", "chatgpt", 600, 1), now);
        let mid = ranker.score(article("https://example.com/b", "chatgpt", 600, 48), now);
        let stale = ranker.score(article("https://example.com/c", "chatgpt", 600, 100), now);

        assert!((fresh.breakdown.recency - default_w_recency()).abs() < 1e-6);
        assert!(mid.breakdown.recency > 0.0 && mid.breakdown.recency < fresh.breakdown.recency);
        assert_eq!(stale.breakdown.recency, 0.0);
    }

    #[test]
    fn test_unknown_domain_gets_default_not_zero() {
        let ranker = StoryRanker::default();
        let a = ranker.score(
            article("https://obscure-blog.net/x", "chatgpt", 600, 1),
            Utc::now(),
        );
        assert!(a.breakdown.source_authority > 0.0);
    }

    #[test]
    fn test_missing_engagement_contributes_zero() {
        let ranker = StoryRanker::default();
        let now = Utc::now();
        let without = ranker.score(article("https://example.com/a", "chatgpt", 600, 1), now);
        let with = ranker.score(
            article("https://example.com/b", "chatgpt", 600, 1).with_engagement(250.0),
            now,
        );

        assert_eq!(without.breakdown.engagement, 0.0);
        assert!((with.breakdown.engagement - default_w_engagement() * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_exclusion_zeroes_score() {
        let ranker = StoryRanker::default();
        let a = ranker.score(
            article(
                "https://example.com/promo",
                "chatgpt promo code inside",
                600,
                1,
            ),
            Utc::now(),
        );
        assert_eq!(a.score, 0.0);
    }

    #[test]
    fn test_rank_is_deterministic() {
        let ranker = StoryRanker::default();
        let now = Utc::now();
        let articles = vec![
            article("https://example.com/a", "chatgpt news", 600, 1),
            article("https://example.com/b", "openai llm gpt", 700, 2),
            article("https://example.com/c", "weather report", 300, 50),
        ];

        let first = ranker.rank(articles.clone(), now);
        let second = ranker.rank(articles, now);

        let ids: Vec<_> = first.iter().map(|s| s.article.id.clone()).collect();
        let ids2: Vec<_> = second.iter().map(|s| s.article.id.clone()).collect();
        assert_eq!(ids, ids2);
    }

    #[test]
    fn test_rank_collapses_duplicate_canonical_urls() {
        let ranker = StoryRanker::default();
        let now = Utc::now();
        let ranked = ranker.rank(
            vec![
                article("https://example.com/a?utm_source=feed", "chatgpt llm", 600, 1),
                article("https://example.com/a?utm_source=mail", "chatgpt llm again", 600, 1),
                article("https://example.com/b", "openai news", 600, 1),
            ],
            now,
        );
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_tie_breaks_by_recency_then_authority() {
        let ranker = StoryRanker::default();
        let now = Utc::now();

        // Identical text and length, same score; newer article must win.
        let older = article("https://obscure-a.net/x", "chatgpt llm", 600, 10);
        let newer = article("https://obscure-b.net/x", "chatgpt llm", 600, 5);
        let ranked = ranker.rank(vec![older, newer], now);
        assert_eq!(ranked[0].article.source_domain, "obscure-b.net");

        // Same timestamp: authority rank decides.
        let ts = Some(now - Duration::hours(1));
        let mut low = article("https://engadget.com/x", "chatgpt llm", 600, 1);
        low.published = ts;
        let mut high = article("https://theverge.com/x", "chatgpt llm", 600, 1);
        high.published = ts;
        // Equalize the authority weight contribution so only the rank differs
        let mut config = RankingConfig::default();
        for e in &mut config.authority {
            e.weight = 0.8;
        }
        let ranker = StoryRanker::new(config);
        let ranked = ranker.rank(vec![low, high], now);
        assert_eq!(ranked[0].article.source_domain, "theverge.com");
    }
}
