//! Visual-sourcing variants: article imagery, stock providers, and the
//! solid-colour placeholder that terminates the chain.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{Article, VisualRef};

use super::{BackendError, VisualBackend, VisualQuery};

/// Uses the images the article itself carries. First in the chain because
/// nothing matches the story better than its own imagery.
#[derive(Debug, Default)]
pub struct ArticleImageBackend;

#[async_trait]
impl VisualBackend for ArticleImageBackend {
    fn name(&self) -> &str {
        "article_image"
    }

    async fn fetch(&self, query: &VisualQuery) -> Result<Vec<VisualRef>, BackendError> {
        if query.article_images.is_empty() {
            return Err(BackendError::NotFound);
        }
        Ok(query
            .article_images
            .iter()
            .map(|url| VisualRef::Image {
                url: url.clone(),
                source: "article".to_string(),
            })
            .collect())
    }
}

/// Pexels stock video search (portrait orientation).
pub struct PexelsBackend {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    count: usize,
}

#[derive(Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

#[derive(Deserialize)]
struct PexelsVideo {
    #[serde(default)]
    video_files: Vec<PexelsVideoFile>,
}

#[derive(Deserialize)]
struct PexelsVideoFile {
    link: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

impl PexelsBackend {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.pexels.com/videos/search";

    pub fn new(
        endpoint: String,
        api_key: String,
        count: usize,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("building pexels http client")?,
            endpoint,
            api_key,
            count,
        })
    }
}

#[async_trait]
impl VisualBackend for PexelsBackend {
    fn name(&self) -> &str {
        "pexels"
    }

    async fn fetch(&self, query: &VisualQuery) -> Result<Vec<VisualRef>, BackendError> {
        let q = if query.keywords.is_empty() {
            "technology".to_string()
        } else {
            query.keywords.join(" ")
        };

        let resp = self
            .http
            .get(&self.endpoint)
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", q.as_str()),
                ("per_page", "15"),
                ("orientation", "portrait"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), &body));
        }

        let parsed: PexelsResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let clips: Vec<VisualRef> = parsed
            .videos
            .iter()
            .filter_map(|v| {
                // Prefer portrait files; fall back to the first file
                v.video_files
                    .iter()
                    .find(|f| f.height > f.width)
                    .or_else(|| v.video_files.first())
            })
            .take(self.count)
            .map(|f| VisualRef::Clip {
                url: f.link.clone(),
                source: "pexels".to_string(),
            })
            .collect();

        if clips.is_empty() {
            return Err(BackendError::NotFound);
        }
        debug!(count = clips.len(), query = %q, "Pexels clips found");
        Ok(clips)
    }
}

/// Pixabay stock video search, the second stock provider in the chain.
pub struct PixabayBackend {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    count: usize,
}

#[derive(Deserialize)]
struct PixabayResponse {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Deserialize)]
struct PixabayHit {
    videos: PixabayVideoSet,
}

#[derive(Deserialize)]
struct PixabayVideoSet {
    medium: PixabayVideoFile,
}

#[derive(Deserialize)]
struct PixabayVideoFile {
    url: String,
}

impl PixabayBackend {
    pub const DEFAULT_ENDPOINT: &'static str = "https://pixabay.com/api/videos/";

    pub fn new(
        endpoint: String,
        api_key: String,
        count: usize,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("building pixabay http client")?,
            endpoint,
            api_key,
            count,
        })
    }
}

#[async_trait]
impl VisualBackend for PixabayBackend {
    fn name(&self) -> &str {
        "pixabay"
    }

    async fn fetch(&self, query: &VisualQuery) -> Result<Vec<VisualRef>, BackendError> {
        let q = query.keywords.join(" ");

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", q.as_str()),
                ("per_page", "15"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), &body));
        }

        let parsed: PixabayResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let clips: Vec<VisualRef> = parsed
            .hits
            .iter()
            .take(self.count)
            .map(|h| VisualRef::Clip {
                url: h.videos.medium.url.clone(),
                source: "pixabay".to_string(),
            })
            .collect();

        if clips.is_empty() {
            return Err(BackendError::NotFound);
        }
        Ok(clips)
    }
}

/// Solid-colour background. The terminal fallback: it cannot fail, so the
/// visuals stage as a whole is guaranteed to succeed.
#[derive(Debug, Clone)]
pub struct SolidColorBackend {
    pub rgb: [u8; 3],
}

impl Default for SolidColorBackend {
    fn default() -> Self {
        // Dark slate, readable under white captions
        Self { rgb: [18, 24, 38] }
    }
}

#[async_trait]
impl VisualBackend for SolidColorBackend {
    fn name(&self) -> &str {
        "solid_color"
    }

    async fn fetch(&self, _query: &VisualQuery) -> Result<Vec<VisualRef>, BackendError> {
        Ok(vec![VisualRef::SolidColor { rgb: self.rgb }])
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "from", "have", "has", "was", "were", "are",
    "will", "would", "could", "should", "been", "their", "they", "them", "than", "then", "when",
    "what", "which", "while", "after", "before", "about", "into", "over", "under", "more", "most",
    "some", "such", "only", "also", "just", "says", "said", "year", "years", "today", "news",
];

/// Extract search keywords for stock-media queries: frequent informative
/// terms from the title and the opening of the body.
pub fn search_keywords(article: &Article, max: usize) -> Vec<String> {
    let lead: String = article.body.chars().take(300).collect();
    let text = format!("{} {}", article.title, lead).to_lowercase();

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.len() < 4 || STOPWORDS.contains(&raw) {
            continue;
        }
        let word = raw.to_string();
        if !counts.contains_key(&word) {
            order.push(word.clone());
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    // Sort by frequency, first occurrence breaking ties, so output is stable
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(max);
    order
}
