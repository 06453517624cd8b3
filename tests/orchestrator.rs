//! Full-pipeline integration tests with fake backends.
//!
//! The plan is assembled by hand so every external collaborator is a fake;
//! only the orchestrator, stage runner, and publisher state machines are
//! real.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use newsreel::adapters::{
    ArticleImageBackend, ArticleSource, Assembler, AssemblyInput, BackendError, NarrationBackend,
    ScriptBackend, VisualBackend, VisualQuery,
};
use newsreel::config::{Config, ConfigFile, Secrets};
use newsreel::core::{PipelineOrchestrator, PipelinePlan, RetryPolicy};
use newsreel::domain::{
    Artifact, Article, Platform, PublishError, RunStatus, Story, VisualRef,
};
use newsreel::publish::{
    ChunkOutcome, Publisher, TikTokApi, TikTokPublisher, TikTokStatus, YouTubeApi,
    YouTubePublisher,
};
use tempfile::TempDir;

struct FakeSource(Vec<Article>);

#[async_trait]
impl ArticleSource for FakeSource {
    fn name(&self) -> &str {
        "fake_feed"
    }

    async fn fetch(&self) -> Result<Vec<Article>, BackendError> {
        Ok(self.0.clone())
    }
}

struct RateLimitedScript;

#[async_trait]
impl ScriptBackend for RateLimitedScript {
    fn name(&self) -> &str {
        "llm"
    }

    async fn generate(&self, _story: &Story) -> Result<String, BackendError> {
        Err(BackendError::RateLimited)
    }
}

struct WorkingScript;

#[async_trait]
impl ScriptBackend for WorkingScript {
    fn name(&self) -> &str {
        "template"
    }

    async fn generate(&self, story: &Story) -> Result<String, BackendError> {
        Ok(format!("Big story today: {}.", story.title()))
    }
}

struct BrokenScript;

#[async_trait]
impl ScriptBackend for BrokenScript {
    fn name(&self) -> &str {
        "broken"
    }

    async fn generate(&self, _story: &Story) -> Result<String, BackendError> {
        Err(BackendError::MalformedResponse("garbage".into()))
    }
}

struct FakeNarration;

#[async_trait]
impl NarrationBackend for FakeNarration {
    fn name(&self) -> &str {
        "fake_tts"
    }

    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, BackendError> {
        Ok(vec![0u8; 256])
    }
}

struct FakeStock;

#[async_trait]
impl VisualBackend for FakeStock {
    fn name(&self) -> &str {
        "stock"
    }

    async fn fetch(&self, _query: &VisualQuery) -> Result<Vec<VisualRef>, BackendError> {
        Ok(vec![VisualRef::Clip {
            url: "https://stock.example/clip.mp4".into(),
            source: "stock".into(),
        }])
    }
}

/// Writes a small real file so publishers can read bytes, but reports the
/// configured duration and size.
struct FakeAssembler {
    duration_secs: f64,
    size_bytes: u64,
}

#[async_trait]
impl Assembler for FakeAssembler {
    fn name(&self) -> &str {
        "fake_assembler"
    }

    async fn build(&self, input: &AssemblyInput) -> Result<Artifact, BackendError> {
        tokio::fs::create_dir_all(&input.out_dir)
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;
        let video_path = input.out_dir.join("short.mp4");
        tokio::fs::write(&video_path, vec![1u8; 1024])
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;

        Ok(Artifact {
            script: input.script.clone(),
            audio_path: input.audio_path.clone(),
            visuals: input.visuals.clone(),
            video_path,
            duration_secs: self.duration_secs,
            size_bytes: self.size_bytes,
            metadata: input.metadata.clone(),
        })
    }
}

/// Sleeps before delegating, so the run budget can expire mid-assembly.
struct SlowAssembler {
    inner: FakeAssembler,
    delay: Duration,
}

#[async_trait]
impl Assembler for SlowAssembler {
    fn name(&self) -> &str {
        "slow_assembler"
    }

    async fn build(&self, input: &AssemblyInput) -> Result<Artifact, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.build(input).await
    }
}

struct SucceedingYouTube;

#[async_trait]
impl YouTubeApi for SucceedingYouTube {
    async fn refresh_access_token(&self) -> Result<String, PublishError> {
        Ok("token".into())
    }

    async fn begin_upload(
        &self,
        _token: &str,
        _metadata: &newsreel::domain::Metadata,
        _total_bytes: u64,
    ) -> Result<String, PublishError> {
        Ok("https://upload.example/session".into())
    }

    async fn upload_chunk(
        &self,
        _session: &str,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkOutcome, PublishError> {
        if offset + chunk.len() as u64 >= total_bytes {
            Ok(ChunkOutcome::Complete {
                video_id: "abc123".into(),
            })
        } else {
            Ok(ChunkOutcome::Accepted {
                next_offset: offset + chunk.len() as u64,
            })
        }
    }
}

struct StuckTikTok;

#[async_trait]
impl TikTokApi for StuckTikTok {
    async fn init_publish(
        &self,
        _title: &str,
        _video_size: u64,
        _chunk_size: u64,
        _total_chunks: u64,
    ) -> Result<newsreel::publish::tiktok::PublishTarget, PublishError> {
        Ok(newsreel::publish::tiktok::PublishTarget {
            publish_id: "pub-1".into(),
            upload_url: "https://upload.example/slot".into(),
        })
    }

    async fn upload(
        &self,
        _upload_url: &str,
        _chunk: &[u8],
        _offset: u64,
        _total_bytes: u64,
    ) -> Result<(), PublishError> {
        Ok(())
    }

    async fn fetch_status(&self, _publish_id: &str) -> Result<TikTokStatus, PublishError> {
        Ok(TikTokStatus::Processing)
    }
}

fn fast_config(out_dir: &TempDir) -> Config {
    let mut file = ConfigFile::default();
    file.retry = RetryPolicy {
        max_attempts: 2,
        initial_delay_ms: 1,
        max_delay_ms: 2,
        backoff_multiplier: 1.0,
        jitter: 0.0,
    };
    file.selection.score_floor = 0.2;
    file.output_dir = out_dir.path().to_path_buf();
    Config {
        file,
        secrets: Secrets::default(),
    }
}

fn articles() -> Vec<Article> {
    vec![
        Article::from_raw(
            "https://theverge.com/ai-model",
            "OpenAI ships a new large language model, ChatGPT grows",
            format!(
                "Machine learning and the new AI model dominate the week. {}",
                "word ".repeat(900)
            ),
            Some(Utc::now() - chrono::Duration::hours(2)),
        )
        .unwrap(),
        Article::from_raw(
            "https://example.com/markets",
            "Regional markets drift sideways",
            "word ".repeat(600),
            Some(Utc::now() - chrono::Duration::hours(50)),
        )
        .unwrap(),
        Article::from_raw(
            "https://example.com/note",
            "Short local note",
            "tiny body",
            Some(Utc::now() - chrono::Duration::hours(1)),
        )
        .unwrap(),
    ]
}

fn plan(
    source: Vec<Article>,
    script: Vec<Arc<dyn ScriptBackend>>,
    assembler: impl Assembler + 'static,
    publishers: Vec<Arc<dyn Publisher>>,
) -> PipelinePlan {
    PipelinePlan {
        source: Arc::new(FakeSource(source)),
        script,
        narration: vec![Arc::new(FakeNarration)],
        visuals: vec![Arc::new(ArticleImageBackend), Arc::new(FakeStock)],
        assembler: Arc::new(assembler),
        publishers,
        stock_available: true,
    }
}

#[tokio::test]
async fn test_empty_candidate_set_is_a_skip_day() {
    let out = TempDir::new().unwrap();
    let config = fast_config(&out);
    let plan = plan(
        vec![],
        vec![Arc::new(WorkingScript)],
        FakeAssembler {
            duration_secs: 42.0,
            size_bytes: 18 * 1024 * 1024,
        },
        vec![],
    );

    let outcome = PipelineOrchestrator::new(&config, plan).run().await;

    assert_eq!(outcome.status, RunStatus::SkippedNoStory);
    assert!(outcome.story_id.is_none());
    assert!(outcome.publishes.is_empty());
    assert!(outcome.failure.is_none());
}

#[tokio::test]
async fn test_end_to_end_with_fallbacks_and_split_publish() {
    let out = TempDir::new().unwrap();
    let config = fast_config(&out);

    let publishers: Vec<Arc<dyn Publisher>> = vec![
        Arc::new(YouTubePublisher::new(SucceedingYouTube)),
        Arc::new(
            TikTokPublisher::new(StuckTikTok, config.file.limits.clone())
                .with_polling(Duration::from_millis(1), 3),
        ),
    ];
    // Script falls back from the rate-limited LLM to the template; the
    // story has no images so visuals fall through to the stock provider.
    let plan = plan(
        articles(),
        vec![Arc::new(RateLimitedScript), Arc::new(WorkingScript)],
        FakeAssembler {
            duration_secs: 42.0,
            size_bytes: 18 * 1024 * 1024,
        },
        publishers,
    );

    let outcome = PipelineOrchestrator::new(&config, plan).run().await;

    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome
        .story_title
        .as_deref()
        .unwrap()
        .contains("OpenAI"));
    assert!(outcome.artifact.is_some());

    let youtube = outcome.attempt_for(Platform::YouTube).unwrap();
    assert!(youtube.is_published());
    assert_eq!(youtube.external_id.as_deref(), Some("abc123"));

    let tiktok = outcome.attempt_for(Platform::TikTok).unwrap();
    assert!(!tiktok.is_published());
    assert_eq!(tiktok.error, Some(PublishError::Timeout));
}

#[tokio::test]
async fn test_out_of_bounds_artifact_fails_before_any_publish() {
    for (duration, size) in [(61.0, 18 * 1024 * 1024), (42.0, 51 * 1024 * 1024)] {
        let out = TempDir::new().unwrap();
        let config = fast_config(&out);
        let plan = plan(
            articles(),
            vec![Arc::new(WorkingScript)],
            FakeAssembler {
                duration_secs: duration,
                size_bytes: size,
            },
            vec![Arc::new(YouTubePublisher::new(SucceedingYouTube))],
        );

        let outcome = PipelineOrchestrator::new(&config, plan).run().await;

        assert_eq!(outcome.status, RunStatus::FailedPipeline);
        assert!(outcome.publishes.is_empty());
        assert_eq!(outcome.failure.as_ref().unwrap().stage, "validate");
    }
}

#[tokio::test]
async fn test_exhausted_script_chain_records_full_cause() {
    let out = TempDir::new().unwrap();
    let config = fast_config(&out);
    let plan = plan(
        articles(),
        vec![Arc::new(RateLimitedScript), Arc::new(BrokenScript)],
        FakeAssembler {
            duration_secs: 42.0,
            size_bytes: 18 * 1024 * 1024,
        },
        vec![],
    );

    let outcome = PipelineOrchestrator::new(&config, plan).run().await;

    assert_eq!(outcome.status, RunStatus::FailedPipeline);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.stage, "script");
    // Two retries of the transient variant, one shot of the permanent one
    assert_eq!(failure.attempts.len(), 3);
    assert!(failure.attempts[0].transient);
    assert!(!failure.attempts[2].transient);
}

#[tokio::test]
async fn test_budget_exhaustion_after_assembly_still_completes() {
    let out = TempDir::new().unwrap();
    let mut config = fast_config(&out);
    config.file.limits.run_budget_secs = 1;

    let plan = plan(
        articles(),
        vec![Arc::new(WorkingScript)],
        SlowAssembler {
            inner: FakeAssembler {
                duration_secs: 42.0,
                size_bytes: 18 * 1024 * 1024,
            },
            delay: Duration::from_millis(1300),
        },
        vec![Arc::new(YouTubePublisher::new(SucceedingYouTube))],
    );

    let outcome = PipelineOrchestrator::new(&config, plan).run().await;

    // The artifact exists, so the run completed even though the budget ran
    // out before any upload could start.
    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.artifact.is_some());
    assert!(outcome.publishes.is_empty());
    assert!(outcome.failure.is_none());
}

#[tokio::test]
async fn test_exhausted_budget_fails_fast_before_a_stage() {
    let out = TempDir::new().unwrap();
    let mut config = fast_config(&out);
    config.file.limits.run_budget_secs = 0;

    let plan = plan(
        articles(),
        vec![Arc::new(WorkingScript)],
        FakeAssembler {
            duration_secs: 42.0,
            size_bytes: 18 * 1024 * 1024,
        },
        vec![],
    );

    let outcome = PipelineOrchestrator::new(&config, plan).run().await;

    assert_eq!(outcome.status, RunStatus::FailedPipeline);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.stage, "script");
    assert!(failure.reason.contains("budget"));
}
