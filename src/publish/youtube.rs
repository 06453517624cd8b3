//! YouTube publishing: OAuth token refresh plus a resumable chunked upload.
//!
//! The upload walks an explicit state machine so interrupted chunks resume
//! from the confirmed offset instead of restarting the transfer.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::{Artifact, Metadata, Platform, PublishAttempt, PublishError};

use super::{error_from_status, Publisher};

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;
const DEFAULT_MAX_RESUMES: u32 = 5;

/// States of the YouTube upload machine. Offsets are bytes confirmed by the
/// remote end, not bytes sent.
#[derive(Debug, Clone, PartialEq)]
pub enum YouTubeState {
    Init,
    TokenRefreshed {
        token: String,
    },
    UploadStarted {
        token: String,
        session: String,
        offset: u64,
    },
    /// Re-entered after a transient transport failure; retries the remaining
    /// bytes from the confirmed offset rather than restarting from zero.
    UploadResumed {
        token: String,
        session: String,
        offset: u64,
        resumes: u32,
    },
    Uploaded {
        video_id: String,
    },
    Failed {
        error: PublishError,
    },
}

impl YouTubeState {
    fn label(&self) -> &'static str {
        match self {
            YouTubeState::Init => "init",
            YouTubeState::TokenRefreshed { .. } => "token_refreshed",
            YouTubeState::UploadStarted { .. } => "upload_started",
            YouTubeState::UploadResumed { .. } => "upload_resumed",
            YouTubeState::Uploaded { .. } => "uploaded",
            YouTubeState::Failed { .. } => "failed",
        }
    }
}

/// Result of sending one chunk to the resumable session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// Chunk accepted; the server confirmed bytes up to (not including) this offset
    Accepted { next_offset: u64 },
    /// Upload complete
    Complete { video_id: String },
}

/// The remote calls the upload machine makes, kept behind a trait so the
/// machine is testable without the network.
#[async_trait]
pub trait YouTubeApi: Send + Sync {
    async fn refresh_access_token(&self) -> Result<String, PublishError>;

    /// Open a resumable upload session, returning the session URI.
    async fn begin_upload(
        &self,
        token: &str,
        metadata: &Metadata,
        total_bytes: u64,
    ) -> Result<String, PublishError>;

    async fn upload_chunk(
        &self,
        session: &str,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkOutcome, PublishError>;
}

/// Drives the YouTube upload state machine over a `YouTubeApi`.
pub struct YouTubePublisher<A> {
    api: A,
    chunk_size: usize,
    max_resumes: u32,
}

impl<A: YouTubeApi> YouTubePublisher<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_resumes: DEFAULT_MAX_RESUMES,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn drive(&self, metadata: &Metadata, bytes: &[u8]) -> YouTubeState {
        let total = bytes.len() as u64;
        let mut state = YouTubeState::Init;

        loop {
            debug!(state = state.label(), "YouTube publish step");
            state = match state {
                YouTubeState::Init => match self.api.refresh_access_token().await {
                    Ok(token) => YouTubeState::TokenRefreshed { token },
                    Err(error) => YouTubeState::Failed { error },
                },

                YouTubeState::TokenRefreshed { token } => {
                    match self.api.begin_upload(&token, metadata, total).await {
                        Ok(session) => YouTubeState::UploadStarted {
                            token,
                            session,
                            offset: 0,
                        },
                        Err(error) => YouTubeState::Failed { error },
                    }
                }

                YouTubeState::UploadStarted {
                    token,
                    session,
                    offset,
                } => self.send_chunk(bytes, token, session, offset, 0).await,

                YouTubeState::UploadResumed {
                    token,
                    session,
                    offset,
                    resumes,
                } => self.send_chunk(bytes, token, session, offset, resumes).await,

                terminal @ (YouTubeState::Uploaded { .. } | YouTubeState::Failed { .. }) => {
                    return terminal;
                }
            };
        }
    }

    async fn send_chunk(
        &self,
        bytes: &[u8],
        token: String,
        session: String,
        offset: u64,
        resumes: u32,
    ) -> YouTubeState {
        let total = bytes.len() as u64;
        let end = (offset as usize + self.chunk_size).min(bytes.len());
        let chunk = &bytes[offset as usize..end];

        match self.api.upload_chunk(&session, chunk, offset, total).await {
            Ok(ChunkOutcome::Complete { video_id }) => YouTubeState::Uploaded { video_id },
            // Progress resets the resume budget
            Ok(ChunkOutcome::Accepted { next_offset }) => YouTubeState::UploadStarted {
                token,
                session,
                offset: next_offset,
            },
            Err(error) if error.is_transient() && resumes < self.max_resumes => {
                warn!(
                    offset,
                    resumes = resumes + 1,
                    %error,
                    "Chunk upload interrupted, resuming"
                );
                YouTubeState::UploadResumed {
                    token,
                    session,
                    offset,
                    resumes: resumes + 1,
                }
            }
            Err(error) if error.is_transient() => YouTubeState::Failed {
                error: PublishError::Timeout,
            },
            Err(error) => YouTubeState::Failed { error },
        }
    }
}

#[async_trait]
impl<A: YouTubeApi> Publisher for YouTubePublisher<A> {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    #[instrument(skip(self, artifact), fields(video = %artifact.video_path.display()))]
    async fn publish(&self, artifact: &Artifact) -> PublishAttempt {
        let bytes = match tokio::fs::read(&artifact.video_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return PublishAttempt::failed(
                    Platform::YouTube,
                    PublishError::Protocol(format!("unreadable video file: {e}")),
                );
            }
        };

        match self.drive(&artifact.metadata, &bytes).await {
            YouTubeState::Uploaded { video_id } => {
                info!(video_id, "YouTube upload complete");
                PublishAttempt::published(Platform::YouTube, video_id)
            }
            YouTubeState::Failed { error } => {
                warn!(%error, "YouTube upload failed");
                PublishAttempt::failed(Platform::YouTube, error)
            }
            // drive() only returns terminal states
            other => PublishAttempt::failed(
                Platform::YouTube,
                PublishError::Protocol(format!("upload halted in state {}", other.label())),
            ),
        }
    }
}

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const UPLOAD_ENDPOINT: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";

/// Real YouTube Data API client backing `YouTubeApi`.
pub struct HttpYouTubeApi {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    category_id: String,
    privacy_status: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
struct UploadBody<'a> {
    snippet: UploadSnippet<'a>,
    status: UploadStatus<'a>,
}

#[derive(Serialize)]
struct UploadSnippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    #[serde(rename = "categoryId")]
    category_id: &'a str,
}

#[derive(Serialize)]
struct UploadStatus<'a> {
    #[serde(rename = "privacyStatus")]
    privacy_status: &'a str,
    #[serde(rename = "selfDeclaredMadeForKids")]
    self_declared_made_for_kids: bool,
}

#[derive(Deserialize)]
struct UploadedVideo {
    id: String,
}

impl HttpYouTubeApi {
    pub fn new(
        client_id: String,
        client_secret: String,
        refresh_token: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("building youtube http client")?,
            client_id,
            client_secret,
            refresh_token,
            // 28 = Science & Technology
            category_id: "28".to_string(),
            privacy_status: "public".to_string(),
        })
    }
}

#[async_trait]
impl YouTubeApi for HttpYouTubeApi {
    async fn refresh_access_token(&self) -> Result<String, PublishError> {
        let resp = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            // A refused refresh means the grant is gone, whatever the code says
            if status.as_u16() == 400 || status.as_u16() == 401 {
                return Err(PublishError::AuthInvalid);
            }
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), &body));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| PublishError::Protocol(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn begin_upload(
        &self,
        token: &str,
        metadata: &Metadata,
        total_bytes: u64,
    ) -> Result<String, PublishError> {
        let body = UploadBody {
            snippet: UploadSnippet {
                title: &metadata.title,
                description: &metadata.description,
                tags: &metadata.tags,
                category_id: &self.category_id,
            },
            status: UploadStatus {
                privacy_status: &self.privacy_status,
                self_declared_made_for_kids: false,
            },
        };

        let resp = self
            .http
            .post(UPLOAD_ENDPOINT)
            .bearer_auth(token)
            .header("X-Upload-Content-Length", total_bytes)
            .header("X-Upload-Content-Type", "video/mp4")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_status(status.as_u16(), &body));
        }

        resp.headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PublishError::Protocol("missing resumable session URI".into()))
    }

    async fn upload_chunk(
        &self,
        session: &str,
        chunk: &[u8],
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkOutcome, PublishError> {
        let last = offset + chunk.len() as u64 - 1;
        let resp = self
            .http
            .put(session)
            .header("Content-Range", format!("bytes {offset}-{last}/{total_bytes}"))
            .body(chunk.to_vec())
            .send()
            .await?;

        let status = resp.status().as_u16();
        match status {
            // 308: chunk stored, more expected; Range confirms how far we got
            308 => {
                let next_offset = resp
                    .headers()
                    .get("Range")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_range_end)
                    .map(|end| end + 1)
                    .unwrap_or(last + 1);
                Ok(ChunkOutcome::Accepted { next_offset })
            }
            200 | 201 => {
                let video: UploadedVideo = resp
                    .json()
                    .await
                    .map_err(|e| PublishError::Protocol(e.to_string()))?;
                Ok(ChunkOutcome::Complete { video_id: video.id })
            }
            s => {
                let body = resp.text().await.unwrap_or_default();
                Err(error_from_status(s, &body))
            }
        }
    }
}

/// Parse the end byte out of a `Range: bytes=0-12345` header.
fn parse_range_end(range: &str) -> Option<u64> {
    range
        .trim_start_matches("bytes=")
        .rsplit('-')
        .next()?
        .parse()
        .ok()
}
