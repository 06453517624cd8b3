//! Narration variants: cloud text-to-speech with a local synthesizer fallback.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{BackendError, NarrationBackend};

/// Cloud TTS over HTTP. POSTs the script and voice, expects encoded audio
/// bytes back.
pub struct CloudTtsBackend {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    voice: String,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

impl CloudTtsBackend {
    pub fn new(
        endpoint: String,
        api_key: String,
        voice: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("building tts http client")?,
            endpoint,
            api_key,
            voice,
        })
    }
}

#[async_trait]
impl NarrationBackend for CloudTtsBackend {
    fn name(&self) -> &str {
        "cloud_tts"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, BackendError> {
        if text.trim().is_empty() {
            return Err(BackendError::InvalidInput("empty script".into()));
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SynthesizeRequest {
                text,
                voice: &self.voice,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), &body));
        }

        let audio = resp.bytes().await?.to_vec();
        if audio.is_empty() {
            return Err(BackendError::EmptyOutput);
        }

        debug!(bytes = audio.len(), voice = %self.voice, "Cloud TTS audio ready");
        Ok(audio)
    }
}

/// Local TTS fallback: runs a synthesizer command (default `espeak-ng`) that
/// writes a wav file, then reads the bytes back. Keeps the narration chain's
/// last resort offline.
pub struct LocalTtsBackend {
    command: String,
    voice: String,
    step_timeout: Duration,
}

impl LocalTtsBackend {
    pub fn new(command: String, voice: String, step_timeout: Duration) -> Self {
        Self {
            command,
            voice,
            step_timeout,
        }
    }
}

impl Default for LocalTtsBackend {
    fn default() -> Self {
        Self::new(
            "espeak-ng".to_string(),
            "en-US".to_string(),
            Duration::from_secs(60),
        )
    }
}

#[async_trait]
impl NarrationBackend for LocalTtsBackend {
    fn name(&self) -> &str {
        "local_tts"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, BackendError> {
        if text.trim().is_empty() {
            return Err(BackendError::InvalidInput("empty script".into()));
        }

        let dir = tempfile::tempdir().map_err(|e| BackendError::Io(e.to_string()))?;
        let wav_path = dir.path().join("narration.wav");

        let child = Command::new(&self.command)
            .args(["-v", &self.voice, "-w"])
            .arg(&wav_path)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Io(format!("failed to spawn {}: {e}", self.command)))?;

        let output = timeout(self.step_timeout, child.wait_with_output())
            .await
            .map_err(|_| BackendError::Timeout)?
            .map_err(|e| BackendError::Io(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Io(format!(
                "{} exited with {}: {}",
                self.command,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let audio = tokio::fs::read(&wav_path)
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;
        if audio.is_empty() {
            return Err(BackendError::EmptyOutput);
        }

        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cloud_tts_rejects_empty_script() {
        let backend = CloudTtsBackend::new(
            "https://tts.invalid/synthesize".into(),
            "key".into(),
            "en-US-Standard".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = backend.synthesize("").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_local_tts_missing_binary_is_io_error() {
        let backend = LocalTtsBackend::new(
            "definitely-not-a-real-synth".into(),
            "en-US".into(),
            Duration::from_secs(5),
        );
        let err = backend.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));
    }
}
