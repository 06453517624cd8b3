//! Story selection: first eligible article from the ranked sequence.
//!
//! Returning no story is a normal daily outcome (there may simply be nothing
//! worth covering), mapped by the orchestrator to `SkippedNoStory`.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{ScoredArticle, Story};

/// Eligibility thresholds for story selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Minimum body word count for a usable story
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Minimum ranking score; everything below is noise
    #[serde(default = "default_score_floor")]
    pub score_floor: f64,
}

fn default_min_words() -> usize {
    300
}
fn default_score_floor() -> f64 {
    0.35
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_words: default_min_words(),
            score_floor: default_score_floor(),
        }
    }
}

/// Applies eligibility filters to the ranked sequence and picks one story.
#[derive(Debug, Clone)]
pub struct StorySelector {
    config: SelectionConfig,

    /// Whether a stock-media provider is configured; an article without a
    /// usable image is still eligible when visuals can fall back to stock.
    stock_available: bool,
}

impl StorySelector {
    pub fn new(config: SelectionConfig, stock_available: bool) -> Self {
        Self {
            config,
            stock_available,
        }
    }

    /// Walk the ranked sequence in order and return the first eligible entry.
    pub fn select(&self, ranked: &[ScoredArticle]) -> Option<Story> {
        for candidate in ranked {
            if let Some(reason) = self.ineligible_reason(candidate) {
                debug!(
                    title = %candidate.article.title,
                    score = candidate.score,
                    reason,
                    "Candidate skipped"
                );
                continue;
            }

            info!(
                id = %candidate.article.id,
                title = %candidate.article.title,
                score = candidate.score,
                "Story selected"
            );
            return Some(Story(candidate.clone()));
        }

        info!(candidates = ranked.len(), "No eligible story");
        None
    }

    fn ineligible_reason(&self, candidate: &ScoredArticle) -> Option<&'static str> {
        if candidate.score < self.config.score_floor {
            return Some("score below floor");
        }
        if candidate.article.word_count() < self.config.min_words {
            return Some("body too short");
        }
        if candidate.article.image_urls.is_empty() && !self.stock_available {
            return Some("no image and no stock fallback");
        }
        None
    }
}
