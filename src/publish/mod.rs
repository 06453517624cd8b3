//! Platform publishers.
//!
//! Each platform is driven by its own explicit state machine. Publishers never
//! return `Err`: every run ends in a `PublishAttempt`, published or failed, so
//! one platform's failure cannot abort the other's upload.

pub mod tiktok;
pub mod youtube;

pub use tiktok::{
    HttpTikTokApi, PublishTarget, TikTokApi, TikTokPublisher, TikTokState, TikTokStatus,
};
pub use youtube::{ChunkOutcome, HttpYouTubeApi, YouTubeApi, YouTubePublisher, YouTubeState};

use async_trait::async_trait;

use crate::domain::{Artifact, Platform, PublishAttempt, PublishError};

/// A platform publisher. `publish` is infallible by contract; failures are
/// folded into the returned attempt.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(&self, artifact: &Artifact) -> PublishAttempt;
}

/// Map an upload-API HTTP status to a publish error.
pub(crate) fn error_from_status(status: u16, body: &str) -> PublishError {
    match status {
        401 => PublishError::AuthInvalid,
        403 => PublishError::QuotaExceeded,
        429 => PublishError::RateLimited,
        400 => PublishError::InvalidMetadata(truncate_body(body)),
        s if s >= 500 => PublishError::Timeout,
        s => PublishError::Protocol(format!("unexpected status {s}: {}", truncate_body(body))),
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            PublishError::Timeout
        } else {
            PublishError::Protocol(e.to_string())
        }
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(200).collect()
}
