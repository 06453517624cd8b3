//! Core pipeline logic: ranking, selection, the stage fallback framework,
//! plan resolution, and the orchestrator.

pub mod limits;
pub mod orchestrator;
pub mod plan;
pub mod ranker;
pub mod selector;
pub mod stage;

pub use limits::{BudgetExceeded, PlatformLimits, RunBudget};
pub use orchestrator::{PipelineOrchestrator, PipelineState};
pub use plan::PipelinePlan;
pub use ranker::{AuthorityEntry, RankingConfig, ScoreWeights, StoryRanker};
pub use selector::{SelectionConfig, StorySelector};
pub use stage::{RetryPolicy, StageAttempt, StageResult, StageRunner, VariantCall};
