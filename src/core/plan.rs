//! Pipeline plan resolution.
//!
//! The fallback chains are fixed at startup: configuration and present
//! credentials decide which variants exist, and the orchestrator never
//! re-plans mid-run. A variant whose secret is missing simply is not in
//! the chain.

use std::sync::Arc;

use tracing::info;

use crate::adapters::{
    ArticleImageBackend, ArticleSource, Assembler, CloudTtsBackend, FfmpegAssembler,
    JsonFeedSource, LlmScriptWriter, LocalTtsBackend, NarrationBackend, PexelsBackend,
    PixabayBackend, ScriptBackend, SolidColorBackend, TemplateScriptWriter, VisualBackend,
};
use crate::config::Config;
use crate::publish::{HttpTikTokApi, HttpYouTubeApi, Publisher, TikTokPublisher, YouTubePublisher};

/// The resolved chains for one run.
pub struct PipelinePlan {
    pub source: Arc<dyn ArticleSource>,
    pub script: Vec<Arc<dyn ScriptBackend>>,
    pub narration: Vec<Arc<dyn NarrationBackend>>,
    pub visuals: Vec<Arc<dyn VisualBackend>>,
    pub assembler: Arc<dyn Assembler>,
    pub publishers: Vec<Arc<dyn Publisher>>,

    /// Whether a stock provider made it into the visuals chain; the selector
    /// uses this to admit stories without their own imagery.
    pub stock_available: bool,
}

impl PipelinePlan {
    pub fn resolve(config: &Config) -> anyhow::Result<Self> {
        let timeout = config.file.limits.call_timeout();
        let secrets = &config.secrets;

        let source: Arc<dyn ArticleSource> =
            Arc::new(JsonFeedSource::new(config.file.feeds.clone(), timeout)?);

        let mut script: Vec<Arc<dyn ScriptBackend>> = Vec::new();
        if let Some(key) = &secrets.gemini_api_key {
            script.push(Arc::new(LlmScriptWriter::new(
                config.file.script.endpoint.clone(),
                key.clone(),
                config.file.script.max_words,
                timeout,
            )?));
        }
        // The template writer cannot be disabled; scripting must always
        // have a working terminal variant
        script.push(Arc::new(TemplateScriptWriter::new(
            3,
            config.file.script.max_words,
        )));

        let mut narration: Vec<Arc<dyn NarrationBackend>> = Vec::new();
        if let Some(key) = &secrets.tts_api_key {
            narration.push(Arc::new(CloudTtsBackend::new(
                config.file.narration.endpoint.clone(),
                key.clone(),
                config.file.narration.voice.clone(),
                timeout,
            )?));
        }
        narration.push(Arc::new(LocalTtsBackend::new(
            config.file.narration.local_command.clone(),
            config.file.narration.local_voice.clone(),
            config.file.limits.call_timeout(),
        )));

        let mut visuals: Vec<Arc<dyn VisualBackend>> = Vec::new();
        visuals.push(Arc::new(ArticleImageBackend));
        let mut stock_available = false;
        if let Some(key) = &secrets.pexels_api_key {
            visuals.push(Arc::new(PexelsBackend::new(
                config.file.visuals.pexels_endpoint.clone(),
                key.clone(),
                config.file.visuals.count,
                timeout,
            )?));
            stock_available = true;
        }
        if let Some(key) = &secrets.pixabay_api_key {
            visuals.push(Arc::new(PixabayBackend::new(
                config.file.visuals.pixabay_endpoint.clone(),
                key.clone(),
                config.file.visuals.count,
                timeout,
            )?));
            stock_available = true;
        }
        visuals.push(Arc::new(SolidColorBackend {
            rgb: config.file.visuals.background_rgb,
        }));

        let assembler: Arc<dyn Assembler> = Arc::new(FfmpegAssembler::new(timeout));

        let mut publishers: Vec<Arc<dyn Publisher>> = Vec::new();
        if config.file.publish.youtube && secrets.youtube_complete() {
            let api = HttpYouTubeApi::new(
                secrets.youtube_client_id.clone().unwrap_or_default(),
                secrets.youtube_client_secret.clone().unwrap_or_default(),
                secrets.youtube_refresh_token.clone().unwrap_or_default(),
                timeout,
            )?;
            publishers.push(Arc::new(YouTubePublisher::new(api)));
        }
        if config.file.publish.tiktok {
            if let Some(token) = &secrets.tiktok_access_token {
                let api = HttpTikTokApi::new(token.clone(), timeout)?;
                publishers.push(Arc::new(TikTokPublisher::new(
                    api,
                    config.file.limits.clone(),
                )));
            }
        }

        let plan = Self {
            source,
            script,
            narration,
            visuals,
            assembler,
            publishers,
            stock_available,
        };
        plan.log_summary();
        Ok(plan)
    }

    fn log_summary(&self) {
        info!(
            script = ?self.script.iter().map(|v| v.name()).collect::<Vec<_>>(),
            narration = ?self.narration.iter().map(|v| v.name()).collect::<Vec<_>>(),
            visuals = ?self.visuals.iter().map(|v| v.name()).collect::<Vec<_>>(),
            publishers = ?self.publishers.iter().map(|p| p.platform().to_string()).collect::<Vec<_>>(),
            "Pipeline plan resolved"
        );
    }
}
