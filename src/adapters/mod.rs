//! Collaborator contracts for external services.
//!
//! Every unreliable external dependency sits behind one of these traits:
//! article sources, script writers, narration synthesizers, visual providers,
//! and the video assembler. Implementations return typed `BackendError`s,
//! never raw panics; the orchestrator decides what is fatal.

pub mod assembler;
pub mod narration;
pub mod script;
pub mod source;
pub mod visuals;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Article, Artifact, Metadata, Story, VisualRef};

pub use assembler::FfmpegAssembler;
pub use narration::{CloudTtsBackend, LocalTtsBackend};
pub use script::{LlmScriptWriter, TemplateScriptWriter};
pub use source::JsonFeedSource;
pub use visuals::{ArticleImageBackend, PexelsBackend, PixabayBackend, SolidColorBackend};

/// Error taxonomy for backend calls.
///
/// Transient kinds are retried with backoff on the same variant; permanent
/// kinds advance the fallback chain to the next variant immediately.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("authentication invalid")]
    AuthInvalid,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no result found")]
    NotFound,

    #[error("backend produced empty output")]
    EmptyOutput,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Timeout | BackendError::RateLimited)
    }

    /// Map an HTTP failure to the taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => BackendError::AuthInvalid,
            404 => BackendError::NotFound,
            429 => BackendError::RateLimited,
            s if s >= 500 => BackendError::Timeout,
            _ => BackendError::MalformedResponse(format!("status {status}: {body}")),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::MalformedResponse(err.to_string())
        } else {
            BackendError::Io(err.to_string())
        }
    }
}

/// Yields raw candidate articles. Sub-source failures must not abort the
/// whole fetch; partial results are acceptable.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<Article>, BackendError>;
}

/// One script-writing variant (LLM-backed, template, ...).
#[async_trait]
pub trait ScriptBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, story: &Story) -> Result<String, BackendError>;
}

/// One narration variant. Returns encoded audio bytes.
#[async_trait]
pub trait NarrationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, BackendError>;
}

/// Input to a visual-sourcing variant.
#[derive(Debug, Clone, Default)]
pub struct VisualQuery {
    /// Search keywords extracted from the story
    pub keywords: Vec<String>,

    /// Image URLs carried by the article itself
    pub article_images: Vec<String>,
}

/// One visual-sourcing variant (article image, stock provider, placeholder).
#[async_trait]
pub trait VisualBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, query: &VisualQuery) -> Result<Vec<VisualRef>, BackendError>;
}

/// Everything the assembler needs to render the video.
#[derive(Debug, Clone)]
pub struct AssemblyInput {
    pub script: String,
    pub audio_path: PathBuf,
    pub visuals: Vec<VisualRef>,
    pub metadata: Metadata,
    pub out_dir: PathBuf,
}

/// Renders the final vertical video from script, audio, and visuals.
#[async_trait]
pub trait Assembler: Send + Sync {
    fn name(&self) -> &str;

    async fn build(&self, input: &AssemblyInput) -> Result<Artifact, BackendError>;
}

/// Shared helper: read a file's size without loading it.
pub(crate) async fn file_size(path: &Path) -> Result<u64, BackendError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| BackendError::Io(e.to_string()))?;
    Ok(meta.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Timeout.is_transient());
        assert!(BackendError::RateLimited.is_transient());
        assert!(!BackendError::AuthInvalid.is_transient());
        assert!(!BackendError::NotFound.is_transient());
        assert!(!BackendError::EmptyOutput.is_transient());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(BackendError::from_status(429, ""), BackendError::RateLimited);
        assert_eq!(BackendError::from_status(401, ""), BackendError::AuthInvalid);
        assert_eq!(BackendError::from_status(404, ""), BackendError::NotFound);
        assert_eq!(BackendError::from_status(503, ""), BackendError::Timeout);
        assert!(matches!(
            BackendError::from_status(400, "bad"),
            BackendError::MalformedResponse(_)
        ));
    }
}
