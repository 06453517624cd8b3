//! Configuration for the newsreel pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Explicit `--config` path
//! 2. NEWSREEL_CONFIG environment variable
//! 3. `newsreel.yaml` in the current directory
//! 4. Built-in defaults (a missing file is not an error)
//!
//! Secrets never live in the file; they are read from the environment at
//! startup so the YAML can be committed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{PlatformLimits, RankingConfig, RetryPolicy, SelectionConfig};

const DEFAULT_CONFIG_NAME: &str = "newsreel.yaml";

/// Raw config file schema (matches YAML structure).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub limits: PlatformLimits,
    #[serde(default)]
    pub script: ScriptConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
    #[serde(default)]
    pub visuals: VisualsConfig,
    #[serde(default)]
    pub publish: PublishConfig,

    /// JSON feed endpoints to pull candidate articles from
    #[serde(default)]
    pub feeds: Vec<String>,

    /// Working directory for rendered artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "default_script_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

fn default_script_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        .to_string()
}

fn default_max_words() -> usize {
    150
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            endpoint: default_script_endpoint(),
            max_words: default_max_words(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NarrationConfig {
    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_local_command")]
    pub local_command: String,
    #[serde(default = "default_local_voice")]
    pub local_voice: String,
}

fn default_tts_endpoint() -> String {
    "https://texttospeech.googleapis.com/v1/text:synthesize".to_string()
}

fn default_voice() -> String {
    "en-US-Neural2-D".to_string()
}

fn default_local_command() -> String {
    "espeak-ng".to_string()
}

fn default_local_voice() -> String {
    "en-US".to_string()
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_tts_endpoint(),
            voice: default_voice(),
            local_command: default_local_command(),
            local_voice: default_local_voice(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualsConfig {
    #[serde(default = "default_pexels_endpoint")]
    pub pexels_endpoint: String,
    #[serde(default = "default_pixabay_endpoint")]
    pub pixabay_endpoint: String,
    #[serde(default = "default_visual_count")]
    pub count: usize,
    #[serde(default = "default_background_rgb")]
    pub background_rgb: [u8; 3],
}

fn default_pexels_endpoint() -> String {
    crate::adapters::PexelsBackend::DEFAULT_ENDPOINT.to_string()
}

fn default_pixabay_endpoint() -> String {
    crate::adapters::PixabayBackend::DEFAULT_ENDPOINT.to_string()
}

fn default_visual_count() -> usize {
    5
}

fn default_background_rgb() -> [u8; 3] {
    [18, 24, 38]
}

impl Default for VisualsConfig {
    fn default() -> Self {
        Self {
            pexels_endpoint: default_pexels_endpoint(),
            pixabay_endpoint: default_pixabay_endpoint(),
            count: default_visual_count(),
            background_rgb: default_background_rgb(),
        }
    }
}

/// Per-platform publish switches. A platform also needs its credentials in
/// the environment to be scheduled.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_true")]
    pub youtube: bool,
    #[serde(default = "default_true")]
    pub tiktok: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            youtube: true,
            tiktok: true,
        }
    }
}

/// Secrets pulled from the environment. Absent secrets disable the variants
/// that need them rather than failing startup.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub tts_api_key: Option<String>,
    pub pexels_api_key: Option<String>,
    pub pixabay_api_key: Option<String>,
    pub youtube_client_id: Option<String>,
    pub youtube_client_secret: Option<String>,
    pub youtube_refresh_token: Option<String>,
    pub tiktok_access_token: Option<String>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: env_var("NEWSREEL_GEMINI_API_KEY"),
            tts_api_key: env_var("NEWSREEL_TTS_API_KEY"),
            pexels_api_key: env_var("NEWSREEL_PEXELS_API_KEY"),
            pixabay_api_key: env_var("NEWSREEL_PIXABAY_API_KEY"),
            youtube_client_id: env_var("NEWSREEL_YT_CLIENT_ID"),
            youtube_client_secret: env_var("NEWSREEL_YT_CLIENT_SECRET"),
            youtube_refresh_token: env_var("NEWSREEL_YT_REFRESH_TOKEN"),
            tiktok_access_token: env_var("NEWSREEL_TIKTOK_ACCESS_TOKEN"),
        }
    }

    pub fn youtube_complete(&self) -> bool {
        self.youtube_client_id.is_some()
            && self.youtube_client_secret.is_some()
            && self.youtube_refresh_token.is_some()
    }
}

/// Fully resolved configuration: file settings plus environment secrets.
#[derive(Debug, Clone)]
pub struct Config {
    pub file: ConfigFile,
    pub secrets: Secrets,
}

impl Config {
    /// Load configuration. An explicit path must exist; the discovered or
    /// default path may be absent, in which case defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => load_config_file(path)?,
            None => {
                let path = env_var("NEWSREEL_CONFIG")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME));
                if path.exists() {
                    load_config_file(&path)?
                } else {
                    ConfigFile::default()
                }
            }
        };

        Ok(Self {
            file,
            secrets: Secrets::from_env(),
        })
    }
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
