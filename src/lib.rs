//! newsreel - daily news-to-short-video pipeline
//!
//! Selects the day's best story from configured news feeds and turns it into
//! a published vertical short, degrading gracefully when any external service
//! misbehaves.
//!
//! # Architecture
//!
//! One run is a fixed sequence of stages:
//! - Candidate articles are fetched, deduplicated, ranked, and one story is
//!   selected (or the day is skipped)
//! - Script, narration, and visuals each run through an ordered fallback
//!   chain of variants under a shared retry policy
//! - The assembled artifact is validated against platform limits, then
//!   published to each configured platform independently
//!
//! No state survives between runs; each day starts from an empty working set.
//!
//! # Modules
//!
//! - `adapters`: external collaborators (feeds, LLM, TTS, stock media, ffmpeg)
//! - `core`: ranking, selection, the stage fallback framework, orchestration
//! - `domain`: data structures (Article, Story, Artifact, RunOutcome)
//! - `publish`: per-platform publishing state machines
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Execute one full run
//! newsreel run
//!
//! # Preview today's ranking
//! newsreel rank --limit 5
//!
//! # Inspect the resolved plan
//! newsreel check
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod publish;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::{PipelineOrchestrator, PipelinePlan, StageResult, StageRunner};
pub use domain::{Artifact, Article, RunOutcome, RunStatus, ScoredArticle, Story};
pub use publish::{Publisher, TikTokPublisher, YouTubePublisher};
