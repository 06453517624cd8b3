//! Article sources.
//!
//! Scraping internals live outside this crate; a source only has to yield raw
//! article records. Sub-source failures are logged and skipped so one dead
//! feed never empties the whole candidate set.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::domain::{dedup_articles, Article};

use super::{ArticleSource, BackendError};

/// Raw article record as emitted by the scraper layer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeedItem {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub engagement: Option<f64>,
}

impl RawFeedItem {
    fn into_article(self) -> Option<Article> {
        let mut article =
            Article::from_raw(&self.url, self.title, self.body, self.published)?
                .with_images(self.image_urls);
        article.engagement = self.engagement;
        Some(article)
    }
}

/// Parse a JSON array of feed items into deduplicated articles.
pub fn parse_feed(json: &str) -> Result<Vec<Article>, BackendError> {
    let items: Vec<RawFeedItem> =
        serde_json::from_str(json).map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

    let articles = items
        .into_iter()
        .filter_map(|item| {
            let url = item.url.clone();
            let article = item.into_article();
            if article.is_none() {
                warn!(url, "Skipping article with unparseable URL");
            }
            article
        })
        .collect();

    Ok(dedup_articles(articles))
}

/// Fetches candidate articles from one or more JSON feed endpoints.
pub struct JsonFeedSource {
    http: reqwest::Client,
    feed_urls: Vec<String>,
}

impl JsonFeedSource {
    pub fn new(feed_urls: Vec<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("building feed http client")?,
            feed_urls,
        })
    }

    async fn fetch_one(&self, url: &str) -> Result<Vec<Article>, BackendError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), &body));
        }
        let text = resp.text().await?;
        parse_feed(&text)
    }
}

#[async_trait]
impl ArticleSource for JsonFeedSource {
    fn name(&self) -> &str {
        "json_feed"
    }

    /// Fetch all feeds, tolerating per-feed failures. Partial results are
    /// acceptable; only a fully empty configuration is an error.
    async fn fetch(&self) -> Result<Vec<Article>, BackendError> {
        if self.feed_urls.is_empty() {
            return Err(BackendError::InvalidInput("no feed urls configured".into()));
        }

        let mut all = Vec::new();
        for url in &self.feed_urls {
            match self.fetch_one(url).await {
                Ok(mut articles) => all.append(&mut articles),
                Err(error) => {
                    warn!(url, %error, "Feed fetch failed, continuing with others");
                }
            }
        }

        Ok(dedup_articles(all))
    }
}
