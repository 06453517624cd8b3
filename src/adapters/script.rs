//! Script-writing variants: LLM-backed generation with a template fallback.
//!
//! Both variants emit a short narration script bounded to a spoken word budget
//! (~2.5 words per second of video) and cleaned for text-to-speech.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::Story;

use super::{BackendError, ScriptBackend};

/// Default word budget for a sub-60-second read
pub const DEFAULT_MAX_WORDS: usize = 150;

/// LLM-backed script writer over a generateContent-style HTTP API.
pub struct LlmScriptWriter {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_words: usize,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl LlmScriptWriter {
    pub fn new(
        endpoint: String,
        api_key: String,
        max_words: usize,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("building script http client")?,
            endpoint,
            api_key,
            max_words,
        })
    }

    fn prompt(&self, story: &Story) -> String {
        let article = story.article();
        format!(
            "Write a punchy narration script for a short vertical news video.\n\
             Hard limit: {} words. Plain spoken prose only: no markdown, no \
             stage directions, no emojis, no hashtags.\n\n\
             Headline: {}\n\nArticle:\n{}",
            self.max_words,
            article.title,
            article.body
        )
    }
}

#[async_trait]
impl ScriptBackend for LlmScriptWriter {
    fn name(&self) -> &str {
        "llm"
    }

    async fn generate(&self, story: &Story) -> Result<String, BackendError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": self.prompt(story) }] }]
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let raw = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();

        if raw.is_empty() {
            return Err(BackendError::EmptyOutput);
        }

        let script = clean_for_tts(&truncate_to_word_limit(&raw, self.max_words));
        debug!(words = script.split_whitespace().count(), "LLM script ready");
        Ok(script)
    }
}

/// Template-based script writer: hook, key points, outro. The deterministic
/// fallback when no LLM is reachable.
pub struct TemplateScriptWriter {
    max_points: usize,
    max_words: usize,
}

impl Default for TemplateScriptWriter {
    fn default() -> Self {
        Self {
            max_points: 3,
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

impl TemplateScriptWriter {
    pub fn new(max_points: usize, max_words: usize) -> Self {
        Self {
            max_points,
            max_words,
        }
    }
}

#[async_trait]
impl ScriptBackend for TemplateScriptWriter {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, story: &Story) -> Result<String, BackendError> {
        let article = story.article();
        if article.title.trim().is_empty() && article.body.trim().is_empty() {
            return Err(BackendError::EmptyOutput);
        }

        let mut script = format!("Big story today: {}.", article.title.trim_end_matches('.'));
        for point in extract_key_points(&article.body, self.max_points) {
            script.push(' ');
            script.push_str(&point);
        }
        script.push_str(" Follow for tomorrow's story.");

        Ok(clean_for_tts(&truncate_to_word_limit(
            &script,
            self.max_words,
        )))
    }
}

/// Pull the first substantial sentences out of the body as key points.
pub fn extract_key_points(text: &str, max_points: usize) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.split_whitespace().count() >= 8)
        .take(max_points)
        .map(str::to_string)
        .collect()
}

/// Truncate a script to a word budget, preferring a sentence boundary.
pub fn truncate_to_word_limit(script: &str, max_words: usize) -> String {
    if script.split_whitespace().count() <= max_words {
        return script.trim().to_string();
    }

    let mut out = String::new();
    let mut words = 0;
    for sentence in script.split_inclusive(['.', '!', '?']) {
        let count = sentence.split_whitespace().count();
        if words + count > max_words && words > 0 {
            break;
        }
        out.push_str(sentence);
        words += count;
        if words >= max_words {
            break;
        }
    }

    if out.is_empty() {
        // Single overlong sentence: hard cut on words
        out = script
            .split_whitespace()
            .take(max_words)
            .collect::<Vec<_>>()
            .join(" ");
    }

    out.trim().to_string()
}

/// Strip everything a TTS voice should not read aloud: markdown markers,
/// bracketed stage directions, and symbol/emoji characters.
pub fn clean_for_tts(script: &str) -> String {
    let mut cleaned = String::with_capacity(script.len());
    let mut depth = 0usize;

    for c in script.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            '*' | '#' | '_' | '`' | '~' => {}
            c if c.is_alphanumeric() || c.is_whitespace() || is_spoken_punct(c) => cleaned.push(c),
            _ => {}
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_spoken_punct(c: char) -> bool {
    matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '\'' | '"' | '-' | '%' | '$' | '&' | '/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Article, ScoreBreakdown, ScoredArticle};

    fn story(title: &str, body: &str) -> Story {
        Story(ScoredArticle {
            article: Article::from_raw("https://example.com/a", title, body, None).unwrap(),
            score: 0.8,
            breakdown: ScoreBreakdown::default(),
        })
    }

    #[tokio::test]
    async fn test_template_produces_bounded_script() {
        let writer = TemplateScriptWriter::default();
        let body = "The first important development happened this morning in the lab. \
                    Researchers then confirmed the second major finding over several hours. \
                    Finally the team announced broad availability for everyone next week. \
                    Short one.";
        let script = writer.generate(&story("AI breakthrough", body)).await.unwrap();

        assert!(script.starts_with("Big story today: AI breakthrough."));
        assert!(script.split_whitespace().count() <= DEFAULT_MAX_WORDS);
        assert!(!script.contains("Short one")); // under the 8-word floor
    }

    #[tokio::test]
    async fn test_template_empty_story_fails() {
        let writer = TemplateScriptWriter::default();
        let err = writer.generate(&story("", "")).await.unwrap_err();
        assert_eq!(err, BackendError::EmptyOutput);
    }

    #[test]
    fn test_truncate_prefers_sentence_boundary() {
        let script = "One two three four. Five six seven eight. Nine ten eleven twelve.";
        let out = truncate_to_word_limit(script, 9);
        assert_eq!(out, "One two three four. Five six seven eight.");
    }

    #[test]
    fn test_truncate_hard_cuts_single_long_sentence() {
        let script = "a b c d e f g h i j";
        assert_eq!(truncate_to_word_limit(script, 3), "a b c");
    }

    #[test]
    fn test_clean_strips_markdown_and_directions() {
        let raw = "**Breaking**: [dramatic pause] AI model scores 95% 🎉 on the test!";
        let cleaned = clean_for_tts(raw);
        assert_eq!(cleaned, "Breaking: AI model scores 95% on the test!");
    }

    #[test]
    fn test_key_points_skips_fragments() {
        let points = extract_key_points("Short. This sentence has more than eight words in it total.", 3);
        assert_eq!(points.len(), 1);
    }
}
