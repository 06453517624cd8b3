//! Video assembly via ffmpeg subprocess.
//!
//! The renderer is an external collaborator; this adapter shells out to
//! ffmpeg, probes the result, and reports honest duration/size numbers for
//! the orchestrator to validate. It never truncates to fit limits.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::domain::{Artifact, VisualRef};

use super::{file_size, Assembler, AssemblyInput, BackendError};

const FRAME_SIZE: &str = "1080x1920";

/// ffmpeg-backed assembler producing a vertical H.264 video.
pub struct FfmpegAssembler {
    ffmpeg: String,
    ffprobe: String,
    http: reqwest::Client,
    step_timeout: Duration,
}

impl FfmpegAssembler {
    pub fn new(step_timeout: Duration) -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            http: reqwest::Client::new(),
            step_timeout,
        }
    }

    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    /// Download a remote visual into the working directory.
    async fn localize(&self, url: &str, dest: &Path) -> Result<PathBuf, BackendError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::from_status(status.as_u16(), ""));
        }
        let bytes = resp.bytes().await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;
        Ok(dest.to_path_buf())
    }

    async fn run(&self, binary: &str, args: &[String]) -> Result<Vec<u8>, BackendError> {
        let child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Io(format!("failed to spawn {binary}: {e}")))?;

        let output = timeout(self.step_timeout, child.wait_with_output())
            .await
            .map_err(|_| BackendError::Timeout)?
            .map_err(|e| BackendError::Io(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Io(format!(
                "{binary} exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }

    async fn probe_duration(&self, video: &Path) -> Result<f64, BackendError> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            video.display().to_string(),
        ];
        let stdout = self.run(&self.ffprobe, &args).await?;
        String::from_utf8_lossy(&stdout)
            .trim()
            .parse::<f64>()
            .map_err(|e| BackendError::Io(format!("unreadable ffprobe duration: {e}")))
    }

    /// ffmpeg input arguments for the background, given the first visual.
    async fn background_args(
        &self,
        visual: &VisualRef,
        work_dir: &Path,
    ) -> Result<Vec<String>, BackendError> {
        match visual {
            VisualRef::SolidColor { rgb } => Ok(vec![
                "-f".into(),
                "lavfi".into(),
                "-i".into(),
                format!(
                    "color=c=0x{:02x}{:02x}{:02x}:s={FRAME_SIZE}",
                    rgb[0], rgb[1], rgb[2]
                ),
            ]),
            VisualRef::Image { url, .. } => {
                let local = self.localize(url, &work_dir.join("background.img")).await?;
                Ok(vec![
                    "-loop".into(),
                    "1".into(),
                    "-i".into(),
                    local.display().to_string(),
                ])
            }
            VisualRef::Clip { url, .. } => {
                let local = self.localize(url, &work_dir.join("background.mp4")).await?;
                Ok(vec![
                    "-stream_loop".into(),
                    "-1".into(),
                    "-i".into(),
                    local.display().to_string(),
                ])
            }
        }
    }
}

#[async_trait]
impl Assembler for FfmpegAssembler {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn build(&self, input: &AssemblyInput) -> Result<Artifact, BackendError> {
        let first = input
            .visuals
            .first()
            .ok_or_else(|| BackendError::InvalidInput("no visuals to render".into()))?;
        if input.script.trim().is_empty() {
            return Err(BackendError::InvalidInput("empty script".into()));
        }

        tokio::fs::create_dir_all(&input.out_dir)
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;
        let video_path = input.out_dir.join("short.mp4");

        let mut args: Vec<String> = vec!["-y".into()];
        args.extend(self.background_args(first, &input.out_dir).await?);
        args.extend([
            "-i".into(),
            input.audio_path.display().to_string(),
            "-map".into(),
            "0:v".into(),
            "-map".into(),
            "1:a".into(),
            "-vf".into(),
            format!("scale={FRAME_SIZE}:force_original_aspect_ratio=increase,crop={FRAME_SIZE}"),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-c:a".into(),
            "aac".into(),
            "-shortest".into(),
            video_path.display().to_string(),
        ]);

        debug!(?args, "Rendering video");
        self.run(&self.ffmpeg, &args).await?;

        let duration_secs = self.probe_duration(&video_path).await?;
        let size_bytes = file_size(&video_path).await?;
        info!(
            path = %video_path.display(),
            duration_secs,
            size_bytes,
            "Video rendered"
        );

        Ok(Artifact {
            script: input.script.clone(),
            audio_path: input.audio_path.clone(),
            visuals: input.visuals.clone(),
            video_path,
            duration_secs,
            size_bytes,
            metadata: input.metadata.clone(),
        })
    }
}
