//! The assembled video artifact and its platform constraints.
//!
//! An artifact is only handed to publishing after `validate` passes; platform
//! rejection downstream is worse than a clear local failure.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::limits::PlatformLimits;
use crate::domain::article::Story;

/// The fully assembled short video, ready for publishing once validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Narrated script text (post-cleaning, as spoken)
    pub script: String,

    /// Rendered audio track
    pub audio_path: PathBuf,

    /// Ordered visual sequence used in the render
    pub visuals: Vec<VisualRef>,

    /// Rendered video file
    pub video_path: PathBuf,

    /// Duration in seconds
    pub duration_secs: f64,

    /// File size in bytes
    pub size_bytes: u64,

    /// Upload metadata
    pub metadata: Metadata,
}

impl Artifact {
    /// Check platform bounds. A violation is fatal to the run, never truncated.
    pub fn validate(&self, limits: &PlatformLimits) -> Result<(), ArtifactError> {
        if self.duration_secs < limits.min_duration_secs
            || self.duration_secs > limits.max_duration_secs
        {
            return Err(ArtifactError::DurationOutOfRange {
                actual: self.duration_secs,
                min: limits.min_duration_secs,
                max: limits.max_duration_secs,
            });
        }
        if self.size_bytes > limits.max_size_bytes {
            return Err(ArtifactError::FileTooLarge {
                actual: self.size_bytes,
                limit: limits.max_size_bytes,
            });
        }
        Ok(())
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            video_path: self.video_path.clone(),
            duration_secs: self.duration_secs,
            size_bytes: self.size_bytes,
            title: self.metadata.title.clone(),
            visual_count: self.visuals.len(),
        }
    }
}

/// One visual element in the rendered sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum VisualRef {
    /// Still image fetched from the article or a stock provider
    Image { url: String, source: String },

    /// Stock video clip
    Clip { url: String, source: String },

    /// Solid colour background, the terminal fallback that cannot fail
    SolidColor { rgb: [u8; 3] },
}

/// Upload metadata attached to the artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

// Platform caps: YouTube titles max 100 chars, descriptions 5000.
const TITLE_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 5000;
const TAGS_MAX: usize = 20;

impl Metadata {
    /// Derive upload metadata from the selected story.
    pub fn for_story(story: &Story, tags: &[String]) -> Self {
        let article = story.article();
        let title = truncate_chars(&article.title, TITLE_MAX);

        let mut description = format!(
            "{}\n\nSource: {}",
            first_sentences(&article.body, 2),
            article.source_domain
        );
        if description.chars().count() > DESCRIPTION_MAX {
            description = truncate_chars(&description, DESCRIPTION_MAX);
        }

        Self {
            title,
            description,
            tags: tags.iter().take(TAGS_MAX).cloned().collect(),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn first_sentences(text: &str, count: usize) -> String {
    let mut out = String::new();
    let mut taken = 0;
    for part in text.split_inclusive(['.', '!', '?']) {
        out.push_str(part);
        taken += 1;
        if taken >= count {
            break;
        }
    }
    out.trim().to_string()
}

/// Lightweight artifact record for the run outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub video_path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub title: String,
    pub visual_count: usize,
}

/// Artifact constraint violations.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum ArtifactError {
    #[error("duration {actual:.1}s outside [{min:.0}s, {max:.0}s]")]
    DurationOutOfRange { actual: f64, min: f64, max: f64 },

    #[error("file size {actual} bytes exceeds limit {limit}")]
    FileTooLarge { actual: u64, limit: u64 },
}
