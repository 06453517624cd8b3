//! Run outcomes and per-platform publish attempts.
//!
//! One `RunOutcome` record is emitted per run. It is the durable proof of what
//! happened: which story was chosen, whether an artifact was produced, and how
//! each platform's publish attempt ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::artifact::ArtifactSummary;

/// Publishing platforms driven by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    YouTube,
    TikTok,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::YouTube => write!(f, "youtube"),
            Platform::TikTok => write!(f, "tiktok"),
        }
    }
}

/// Terminal state of one platform's publish state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Published,
    Failed,
}

/// The record of one platform's publishing run. Platform failures are scoped
/// here and never propagate to the other platform or the run status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishAttempt {
    pub platform: Platform,
    pub state: PublishState,
    pub external_id: Option<String>,
    pub error: Option<PublishError>,
}

impl PublishAttempt {
    pub fn published(platform: Platform, external_id: String) -> Self {
        Self {
            platform,
            state: PublishState::Published,
            external_id: Some(external_id),
            error: None,
        }
    }

    pub fn failed(platform: Platform, error: PublishError) -> Self {
        Self {
            platform,
            state: PublishState::Failed,
            external_id: None,
            error: Some(error),
        }
    }

    pub fn is_published(&self) -> bool {
        self.state == PublishState::Published
    }
}

/// Publish error kinds, shared by both platform state machines.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum PublishError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("authentication invalid")]
    AuthInvalid,

    #[error("metadata rejected: {0}")]
    InvalidMetadata(String),

    #[error("platform rejected upload: {0}")]
    Rejected(String),

    #[error("upload held for audit")]
    AuditPending,

    #[error("artifact failed local validation: {0}")]
    LocalValidation(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl PublishError {
    /// Transient errors may be retried in place (e.g. a resumable upload
    /// chunk); everything else is terminal for the platform.
    pub fn is_transient(&self) -> bool {
        matches!(self, PublishError::Timeout | PublishError::RateLimited)
    }
}

/// Overall status of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// An artifact was produced (publishing may still have failed everywhere)
    Completed,

    /// No eligible story today; a normal outcome, not an error
    SkippedNoStory,

    /// A required stage exhausted its fallback chain, or the artifact was invalid
    FailedPipeline,
}

/// One recorded variant failure inside a failed stage, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailure {
    pub variant: String,
    pub error: String,
    pub transient: bool,
}

/// Structured cause chain for a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureCause {
    /// Stage that made the run fatal
    pub stage: String,

    /// Human-readable reason
    pub reason: String,

    /// Every variant attempt of the failing stage, in order
    #[serde(default)]
    pub attempts: Vec<StageFailure>,
}

/// The single structured record emitted for each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub story_id: Option<String>,
    pub story_title: Option<String>,
    pub artifact: Option<ArtifactSummary>,

    /// One attempt per configured platform, order-insensitive
    pub publishes: Vec<PublishAttempt>,

    pub failure: Option<FailureCause>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn attempt_for(&self, platform: Platform) -> Option<&PublishAttempt> {
        self.publishes.iter().find(|a| a.platform == platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_attempt_constructors() {
        let ok = PublishAttempt::published(Platform::YouTube, "abc123".into());
        assert!(ok.is_published());
        assert_eq!(ok.external_id.as_deref(), Some("abc123"));

        let failed = PublishAttempt::failed(Platform::TikTok, PublishError::Timeout);
        assert!(!failed.is_published());
        assert_eq!(failed.error, Some(PublishError::Timeout));
    }

    #[test]
    fn test_transient_classification() {
        assert!(PublishError::Timeout.is_transient());
        assert!(PublishError::RateLimited.is_transient());
        assert!(!PublishError::AuthInvalid.is_transient());
        assert!(!PublishError::QuotaExceeded.is_transient());
        assert!(!PublishError::AuditPending.is_transient());
    }

    #[test]
    fn test_outcome_serialization_round_trip() {
        let outcome = RunOutcome {
            run_id: Uuid::new_v4(),
            status: RunStatus::Completed,
            story_id: Some("abc".into()),
            story_title: Some("Title".into()),
            artifact: None,
            publishes: vec![PublishAttempt::failed(
                Platform::TikTok,
                PublishError::Rejected("too long".into()),
            )],
            failure: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let json = serde_json::to_string(&outcome).unwrap();
        let parsed: RunOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status, RunStatus::Completed);
        assert!(parsed.attempt_for(Platform::TikTok).is_some());
        assert!(parsed.attempt_for(Platform::YouTube).is_none());
    }
}
