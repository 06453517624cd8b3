//! The pipeline orchestrator.
//!
//! One run walks a fixed sequence of stages and ends in exactly one of three
//! statuses. The orchestrator is the only place that decides what is fatal:
//! stage chains absorb their own failures, publishers are platform-scoped,
//! and everything else lands here.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AssemblyInput, VisualQuery};
use crate::adapters::visuals::search_keywords;
use crate::config::Config;
use crate::domain::{
    Artifact, FailureCause, Metadata, PublishAttempt, RunOutcome, RunStatus, Story, VisualRef,
};

use super::limits::{PlatformLimits, RunBudget};
use super::plan::PipelinePlan;
use super::ranker::StoryRanker;
use super::selector::StorySelector;
use super::stage::{StageResult, StageRunner, VariantCall};

const SEARCH_KEYWORD_COUNT: usize = 5;

/// Discrete stages of one run, in execution order. `Skipped` and `Failed`
/// are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Ranked,
    Selected,
    Scripted,
    Narrated,
    Visualized,
    Assembled,
    Published,
    Done,
    Skipped,
    Failed,
}

impl PipelineState {
    fn label(&self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::Ranked => "ranked",
            PipelineState::Selected => "selected",
            PipelineState::Scripted => "scripted",
            PipelineState::Narrated => "narrated",
            PipelineState::Visualized => "visualized",
            PipelineState::Assembled => "assembled",
            PipelineState::Published => "published",
            PipelineState::Done => "done",
            PipelineState::Skipped => "skipped",
            PipelineState::Failed => "failed",
        }
    }
}

/// Sequences the stages of one run and aggregates the outcome.
pub struct PipelineOrchestrator {
    plan: PipelinePlan,
    runner: StageRunner,
    ranker: StoryRanker,
    selector: StorySelector,
    limits: PlatformLimits,
    out_dir: PathBuf,
}

/// Internal early-exit carrier: a stage either advances the run or settles
/// it with a terminal outcome.
enum Settled {
    Skip,
    Fatal(FailureCause),
}

impl PipelineOrchestrator {
    pub fn new(config: &Config, plan: PipelinePlan) -> Self {
        let selector = StorySelector::new(config.file.selection.clone(), plan.stock_available);
        Self {
            plan,
            runner: StageRunner::new(config.file.retry.clone()),
            ranker: StoryRanker::new(config.file.ranking.clone()),
            selector,
            limits: config.file.limits.clone(),
            out_dir: config.file.output_dir.clone(),
        }
    }

    /// Execute one full run. Never returns `Err`: every way a run can end is
    /// a structured `RunOutcome`.
    #[instrument(skip(self))]
    pub async fn run(&self) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let budget = RunBudget::new(self.limits.run_budget());
        let mut state = PipelineState::Start;
        info!(%run_id, "Run starting");

        let result = self.drive(run_id, &budget, &mut state).await;

        let mut outcome = match result {
            Ok(outcome) => outcome,
            Err(Settled::Skip) => {
                state = PipelineState::Skipped;
                RunOutcome {
                    run_id,
                    status: RunStatus::SkippedNoStory,
                    story_id: None,
                    story_title: None,
                    artifact: None,
                    publishes: Vec::new(),
                    failure: None,
                    started_at,
                    finished_at: Utc::now(),
                }
            }
            Err(Settled::Fatal(cause)) => {
                state = PipelineState::Failed;
                warn!(stage = %cause.stage, reason = %cause.reason, "Run failed");
                RunOutcome {
                    run_id,
                    status: RunStatus::FailedPipeline,
                    story_id: None,
                    story_title: None,
                    artifact: None,
                    publishes: Vec::new(),
                    failure: Some(cause),
                    started_at,
                    finished_at: Utc::now(),
                }
            }
        };

        outcome.started_at = started_at;
        info!(
            %run_id,
            status = ?outcome.status,
            state = state.label(),
            elapsed_secs = budget.elapsed().as_secs(),
            "Run finished"
        );
        outcome
    }

    async fn drive(
        &self,
        run_id: Uuid,
        budget: &RunBudget,
        state: &mut PipelineState,
    ) -> Result<RunOutcome, Settled> {
        // Fetch + rank. A dead source is fatal; an empty candidate set is a
        // normal skip day.
        let articles = self
            .plan
            .source
            .fetch()
            .await
            .map_err(|e| fatal("fetch", e.to_string()))?;
        let ranked = self.ranker.rank(articles, Utc::now());
        self.advance(state, PipelineState::Ranked);
        debug!(candidates = ranked.len(), "Articles ranked");

        let story = match self.selector.select(&ranked) {
            Some(story) => story,
            None => {
                info!("No eligible story today");
                return Err(Settled::Skip);
            }
        };
        self.advance(state, PipelineState::Selected);
        info!(story_id = story.id(), title = story.title(), "Story selected");

        let work_dir = self.out_dir.join(run_id.to_string());

        // Script
        self.check_budget(budget, "script")?;
        let script = self
            .run_stage("script", self.script_variants(&story))
            .await?;
        self.advance(state, PipelineState::Scripted);

        // Narration
        self.check_budget(budget, "narration")?;
        let audio = self
            .run_stage("narration", self.narration_variants(&script))
            .await?;
        let audio_path = work_dir.join("narration.wav");
        write_file(&audio_path, &audio)
            .await
            .map_err(|e| fatal("narration", e))?;
        self.advance(state, PipelineState::Narrated);

        // Visuals. The chain ends in a variant that cannot fail, so in
        // practice this stage always succeeds.
        self.check_budget(budget, "visuals")?;
        let keywords = search_keywords(story.article(), SEARCH_KEYWORD_COUNT);
        let query = VisualQuery {
            keywords: keywords.clone(),
            article_images: story.article().image_urls.clone(),
        };
        let visuals = self
            .run_stage("visuals", self.visual_variants(&query))
            .await?;
        self.advance(state, PipelineState::Visualized);

        // Assemble and validate
        self.check_budget(budget, "assemble")?;
        let metadata = Metadata::for_story(&story, &keywords);
        let assembly = AssemblyInput {
            script: script.clone(),
            audio_path,
            visuals,
            metadata,
            out_dir: work_dir,
        };
        let artifact = self
            .run_stage("assemble", self.assemble_variants(&assembly))
            .await?;
        artifact
            .validate(&self.limits)
            .map_err(|e| fatal("validate", e.to_string()))?;
        self.advance(state, PipelineState::Assembled);

        // Publishing is off the fatal path: the artifact is the durable
        // proof of success, however many platforms accept it. A budget
        // exhausted here skips the uploads but never fails the run.
        let publishes = if budget.check().is_ok() {
            self.publish_all(&artifact).await
        } else {
            warn!("Run budget exhausted before publishing, keeping the artifact");
            Vec::new()
        };
        self.advance(state, PipelineState::Published);
        self.advance(state, PipelineState::Done);

        Ok(RunOutcome {
            run_id,
            status: RunStatus::Completed,
            story_id: Some(story.id().to_string()),
            story_title: Some(story.title().to_string()),
            artifact: Some(artifact.summary()),
            publishes,
            failure: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        })
    }

    fn advance(&self, state: &mut PipelineState, to: PipelineState) {
        debug!(from = state.label(), to = to.label(), "Stage transition");
        *state = to;
    }

    fn check_budget(&self, budget: &RunBudget, stage: &str) -> Result<(), Settled> {
        budget.check().map_err(|e| fatal(stage, e.to_string()))
    }

    async fn run_stage<T>(
        &self,
        stage: &str,
        variants: Vec<VariantCall<'_, T>>,
    ) -> Result<T, Settled> {
        match self.runner.run(stage, variants).await {
            StageResult::Success { value, .. } => Ok(value),
            StageResult::Failed { attempts } => Err(Settled::Fatal(FailureCause {
                stage: stage.to_string(),
                reason: format!("all {} variant attempts exhausted", attempts.len()),
                attempts: attempts.iter().map(|a| a.to_failure()).collect(),
            })),
        }
    }

    fn script_variants<'a>(&'a self, story: &'a Story) -> Vec<VariantCall<'a, String>> {
        self.plan
            .script
            .iter()
            .map(|backend| {
                let name = backend.name().to_string();
                let backend = Arc::clone(backend);
                VariantCall::new(name, move || {
                    let backend = Arc::clone(&backend);
                    let story = story.clone();
                    Box::pin(async move { backend.generate(&story).await }) as _
                })
            })
            .collect()
    }

    fn narration_variants<'a>(&'a self, script: &'a str) -> Vec<VariantCall<'a, Vec<u8>>> {
        self.plan
            .narration
            .iter()
            .map(|backend| {
                let name = backend.name().to_string();
                let backend = Arc::clone(backend);
                VariantCall::new(name, move || {
                    let backend = Arc::clone(&backend);
                    Box::pin(async move { backend.synthesize(script).await }) as _
                })
            })
            .collect()
    }

    fn visual_variants<'a>(
        &'a self,
        query: &'a VisualQuery,
    ) -> Vec<VariantCall<'a, Vec<VisualRef>>> {
        self.plan
            .visuals
            .iter()
            .map(|backend| {
                let name = backend.name().to_string();
                let backend = Arc::clone(backend);
                VariantCall::new(name, move || {
                    let backend = Arc::clone(&backend);
                    Box::pin(async move { backend.fetch(query).await }) as _
                })
            })
            .collect()
    }

    fn assemble_variants<'a>(
        &'a self,
        input: &'a AssemblyInput,
    ) -> Vec<VariantCall<'a, Artifact>> {
        let assembler = Arc::clone(&self.plan.assembler);
        vec![VariantCall::new(assembler.name().to_string(), move || {
            let assembler = Arc::clone(&assembler);
            Box::pin(async move { assembler.build(input).await }) as _
        })]
    }

    /// Run every configured publisher concurrently. Each returns an attempt,
    /// never an error; the attempts are independent by construction.
    async fn publish_all(&self, artifact: &Artifact) -> Vec<PublishAttempt> {
        let attempts = join_all(
            self.plan
                .publishers
                .iter()
                .map(|publisher| publisher.publish(artifact)),
        )
        .await;

        for attempt in &attempts {
            info!(
                platform = %attempt.platform,
                published = attempt.is_published(),
                external_id = attempt.external_id.as_deref().unwrap_or("-"),
                "Publish attempt recorded"
            );
        }
        attempts
    }
}

fn fatal(stage: &str, reason: String) -> Settled {
    Settled::Fatal(FailureCause {
        stage: stage.to_string(),
        reason,
        attempts: Vec::new(),
    })
}

async fn write_file(path: &std::path::Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("creating {}: {e}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| format!("writing {}: {e}", path.display()))
}
