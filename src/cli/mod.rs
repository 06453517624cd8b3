//! Command-line interface for newsreel.
//!
//! Provides commands for running the daily pipeline, previewing the ranking,
//! and inspecting the resolved plan.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::core::{PipelineOrchestrator, PipelinePlan, StoryRanker};
use crate::domain::RunStatus;

/// newsreel - daily news-to-short-video pipeline
#[derive(Parser, Debug)]
#[command(name = "newsreel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path (falls back to NEWSREEL_CONFIG, then ./newsreel.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one full pipeline run
    Run,

    /// Fetch and rank candidate articles without producing a video
    Rank {
        /// Maximum number of candidates to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the resolved pipeline plan and which variants are enabled
    Check,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match self.command {
            Commands::Run => run_pipeline(&config).await,
            Commands::Rank { limit } => rank_candidates(&config, limit).await,
            Commands::Check => check_plan(&config),
        }
    }
}

/// Execute one run, print the outcome record, and persist it next to the
/// artifact. The process exits non-zero only on a failed pipeline; a skip
/// day is a clean exit.
async fn run_pipeline(config: &Config) -> Result<()> {
    let plan = PipelinePlan::resolve(config)?;
    let orchestrator = PipelineOrchestrator::new(config, plan);

    let outcome = orchestrator.run().await;

    let rendered =
        serde_json::to_string_pretty(&outcome).context("Failed to serialize run outcome")?;
    println!("{rendered}");

    let outcome_path = config
        .file
        .output_dir
        .join(outcome.run_id.to_string())
        .join("outcome.json");
    if let Some(parent) = outcome_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }
    tokio::fs::write(&outcome_path, rendered)
        .await
        .with_context(|| format!("Failed to write {}", outcome_path.display()))?;

    match outcome.status {
        RunStatus::Completed | RunStatus::SkippedNoStory => Ok(()),
        RunStatus::FailedPipeline => {
            let reason = outcome
                .failure
                .map(|f| format!("{}: {}", f.stage, f.reason))
                .unwrap_or_else(|| "unknown".to_string());
            anyhow::bail!("pipeline failed ({reason})")
        }
    }
}

/// Fetch today's candidates and print the ranking with score breakdowns.
async fn rank_candidates(config: &Config, limit: usize) -> Result<()> {
    let plan = PipelinePlan::resolve(config)?;
    let articles = plan
        .source
        .fetch()
        .await
        .map_err(|e| anyhow::anyhow!("article fetch failed: {e}"))?;

    let ranker = StoryRanker::new(config.file.ranking.clone());
    let ranked = ranker.rank(articles, chrono::Utc::now());

    if ranked.is_empty() {
        println!("No candidate articles.");
        return Ok(());
    }

    for (i, scored) in ranked.iter().take(limit).enumerate() {
        println!(
            "{:>2}. [{:.3}] {} ({})",
            i + 1,
            scored.breakdown.total(),
            scored.article.title,
            scored.article.source_domain
        );
        println!(
            "      keywords {:.2}  recency {:.2}  authority {:.2}  length {:.2}  engagement {:.2}",
            scored.breakdown.keyword_impact,
            scored.breakdown.recency,
            scored.breakdown.source_authority,
            scored.breakdown.length,
            scored.breakdown.engagement
        );
    }
    Ok(())
}

/// Show the resolved plan: enabled variants per stage and publisher list.
fn check_plan(config: &Config) -> Result<()> {
    let plan = PipelinePlan::resolve(config)?;

    println!("feeds:      {}", config.file.feeds.len());
    println!("output dir: {}", config.file.output_dir.display());
    println!(
        "script:     {}",
        plan.script
            .iter()
            .map(|v| v.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    println!(
        "narration:  {}",
        plan.narration
            .iter()
            .map(|v| v.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    println!(
        "visuals:    {}",
        plan.visuals
            .iter()
            .map(|v| v.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    let publishers: Vec<String> = plan
        .publishers
        .iter()
        .map(|p| p.platform().to_string())
        .collect();
    if publishers.is_empty() {
        println!("publishers: none (missing credentials or disabled)");
    } else {
        println!("publishers: {}", publishers.join(", "));
    }
    println!(
        "limits:     {}-{}s, {}MB, {}s run budget",
        config.file.limits.min_duration_secs,
        config.file.limits.max_duration_secs,
        config.file.limits.max_size_bytes / (1024 * 1024),
        config.file.limits.run_budget_secs
    );
    Ok(())
}
