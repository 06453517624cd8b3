//! Domain data structures: articles, stories, artifacts, and run outcomes.

pub mod article;
pub mod artifact;
pub mod outcome;

pub use article::{dedup_articles, Article, ScoreBreakdown, ScoredArticle, Story};
pub use artifact::{Artifact, ArtifactError, ArtifactSummary, Metadata, VisualRef};
pub use outcome::{
    FailureCause, Platform, PublishAttempt, PublishError, PublishState, RunOutcome, RunStatus,
    StageFailure,
};
